use crate::forwarder::ForwardState;
use http::StatusCode;
use registry::RegistryError;
use settings::ConfigError;
use std::io;

#[derive(thiserror::Error, Debug)]
pub enum ForwardError {
    #[error("no session service endpoint for {id}")]
    Endpoint { id: String },
    #[error("invalid session service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("session service request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("session service responded with {0}")]
    Status(StatusCode),
    #[error("session service response interrupted: {0}")]
    Body(#[source] reqwest::Error),
    #[error("illegal forward state transition {from:?} -> {to:?}")]
    IllegalTransition { from: ForwardState, to: ForwardState },
}

#[derive(thiserror::Error, Debug)]
pub enum IdentityError {
    #[error("request carries no credentials")]
    Unauthenticated,
}

#[derive(thiserror::Error, Debug)]
pub enum PortalError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Forward(#[from] ForwardError),
    #[error("registry client error: {0}")]
    Registry(#[from] RegistryError),
    #[error("could not read request body: {0}")]
    RequestBody(Box<dyn std::error::Error + Send + Sync>),
    #[error("could not serialize response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PortalError {
    /// Status of the error response sent to the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            PortalError::Config(ConfigError::UnknownFeature(_)) => StatusCode::NOT_FOUND,
            PortalError::Identity(IdentityError::Unauthenticated) => StatusCode::UNAUTHORIZED,
            PortalError::RequestBody(_) => StatusCode::BAD_REQUEST,
            PortalError::Forward(ForwardError::IllegalTransition { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            PortalError::Forward(_) => StatusCode::BAD_GATEWAY,
            PortalError::Config(_)
            | PortalError::Registry(_)
            | PortalError::Json(_)
            | PortalError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
