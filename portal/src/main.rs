mod config;
mod logging;
mod statsd;

use clap::{Args, Parser, Subcommand};
use config::Config;
use session_proxy::errors::PortalError;
use settings::source::default_properties_path;
use settings::{ConfigSource, ConfigurationResolver};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "portal", about = "Science portal backend")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the portal and admin listeners.
    Run(ServiceArgs),
    /// Print the resolved feature gates as JSON.
    Features(ServiceArgs),
    /// Report required configuration that is missing.
    Check(ServiceArgs),
}

#[derive(Args)]
struct ServiceArgs {
    /// Service config file (YAML).
    #[arg(long, short)]
    config: PathBuf,

    /// Override a portal property, e.g. `-D org.opencadc.science-portal.themeName=canfar`.
    #[arg(short = 'D', value_name = "KEY=VALUE", value_parser = parse_override)]
    define: Vec<(String, String)>,
}

fn parse_override(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got `{s}`")),
    }
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("invalid sentry DSN: {0}")]
    Sentry(#[from] sentry::types::ParseDsnError),
    #[error(transparent)]
    Metrics(#[from] statsd::MetricsError),
    #[error("could not start runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error(transparent)]
    Portal(#[from] PortalError),
    #[error("could not serialize feature gates: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0} required configuration properties are missing")]
    Incomplete(usize),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        CliCommand::Run(args) => run(args),
        CliCommand::Features(args) => features(args),
        CliCommand::Check(args) => check(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("portal: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: ServiceArgs) -> Result<(), CliError> {
    let config = Config::from_file(&args.config)?;
    let _sentry = logging::init(config.common.logging.as_ref())?;
    if let Some(metrics) = &config.common.metrics {
        statsd::init(metrics)?;
    }

    let settings = load_settings(args.define, &config);
    tracing::info!(sources = %settings.source(), "Starting portal");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    runtime.block_on(session_proxy::run(config.portal, settings))?;

    Ok(())
}

fn features(args: ServiceArgs) -> Result<(), CliError> {
    let config = Config::from_file(&args.config)?;
    logging::init(None)?;

    let settings = load_settings(args.define, &config);
    println!("{}", serde_json::to_string_pretty(&settings.feature_gates())?);

    Ok(())
}

fn check(args: ServiceArgs) -> Result<(), CliError> {
    let config = Config::from_file(&args.config)?;
    logging::init(None)?;

    let settings = load_settings(args.define, &config);
    println!("sources: {}", settings.source());
    println!(
        "oidc: {}",
        if settings.oidc_settings().is_some() {
            "configured"
        } else {
            "not configured"
        }
    );

    let problems = settings.check_required();
    for problem in &problems {
        println!("missing: {problem}");
    }

    if problems.is_empty() {
        println!("ok");
        Ok(())
    } else {
        Err(CliError::Incomplete(problems.len()))
    }
}

fn load_settings(overrides: Vec<(String, String)>, config: &Config) -> ConfigurationResolver {
    let properties_file = config
        .portal
        .properties_file
        .clone()
        .unwrap_or_else(|| default_properties_path(dirs::home_dir().as_deref()));

    ConfigurationResolver::new(ConfigSource::load(overrides, &properties_file))
}
