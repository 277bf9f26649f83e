//! The portal's HTTP front: session forwarding plus the feature gate and header link lookups
//! used when rendering pages.

pub mod config;
pub mod errors;
pub mod forwarder;
pub mod identity;
pub mod metrics_defs;
pub mod service;

use errors::PortalError;
use forwarder::SessionForwarder;
use identity::HeaderIdentityProvider;
use registry::{EndpointResolver, RegistryClient};
use service::PortalService;
use settings::ConfigurationResolver;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;

/// Serves the portal routes and the admin endpoints until either listener fails.
pub async fn run(config: config::Config, settings: ConfigurationResolver) -> Result<(), PortalError> {
    shared::metrics_defs::describe_metrics(metrics_defs::ALL_METRICS);
    shared::metrics_defs::describe_metrics(registry::metrics_defs::ALL_METRICS);

    let settings = Arc::new(settings);
    for problem in settings.check_required() {
        tracing::warn!(%problem, "Portal configuration incomplete");
    }

    let endpoints = EndpointResolver::from_client(RegistryClient::new(config.registry)?);
    let forwarder = SessionForwarder::new(settings.clone(), endpoints.clone())?;
    let portal = PortalService::new(
        settings.clone(),
        endpoints,
        forwarder,
        Arc::new(HeaderIdentityProvider),
    );

    let readiness_problems = move || -> Vec<String> {
        settings
            .check_required()
            .iter()
            .map(ToString::to_string)
            .collect()
    };
    let admin = AdminService::<_, PortalError>::new(readiness_problems);

    tokio::try_join!(
        run_http_service(&config.listener.host, config.listener.port, portal),
        run_http_service(
            &config.admin_listener.host,
            config.admin_listener.port,
            admin
        ),
    )?;

    Ok(())
}
