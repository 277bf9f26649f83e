use crate::errors::PortalError;
use crate::forwarder::SessionForwarder;
use crate::identity::IdentityProvider;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Limited};
use hyper::body::Body;
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use registry::EndpointResolver;
use settings::ConfigurationResolver;
use shared::http::{make_error_response, make_json_response, make_text_response};
use std::collections::BTreeMap;
use std::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use url::form_urlencoded;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Largest request body accepted on `POST /session`.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// The portal's HTTP routes:
///
/// - `POST /session` forwards to the session service
/// - `GET /features` lists every feature gate, `GET /features/<name>` a single one
/// - `GET /header-urls` lists the header link URLs
#[derive(Clone)]
pub struct PortalService {
    inner: Arc<Inner>,
}

struct Inner {
    settings: Arc<ConfigurationResolver>,
    endpoints: EndpointResolver,
    forwarder: SessionForwarder,
    identity: Arc<dyn IdentityProvider>,
}

impl PortalService {
    pub fn new(
        settings: Arc<ConfigurationResolver>,
        endpoints: EndpointResolver,
        forwarder: SessionForwarder,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        PortalService {
            inner: Arc::new(Inner {
                settings,
                endpoints,
                forwarder,
                identity,
            }),
        }
    }
}

impl<B> Service<Request<B>> for PortalService
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn Error + Send + Sync>>,
{
    type Response = Response<BoxBody<Bytes, PortalError>>;
    type Error = PortalError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let inner = self.inner.clone();

        Box::pin(async move {
            let method = req.method().clone();
            let path = req.uri().path().to_owned();

            let response = match inner.handle(req).await {
                Ok(response) => response,
                Err(error) => {
                    let status = error.status_code();
                    if status.is_server_error() {
                        tracing::error!(%method, %path, %error, "Request failed");
                    } else {
                        tracing::debug!(%method, %path, %error, "Request rejected");
                    }
                    error_response(status, &error)
                }
            };
            Ok(response)
        })
    }
}

impl Inner {
    async fn handle<B>(
        &self,
        req: Request<B>,
    ) -> Result<Response<BoxBody<Bytes, PortalError>>, PortalError>
    where
        B: Body,
        B::Error: Into<Box<dyn Error + Send + Sync>>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();

        match (&method, path.as_str()) {
            (&Method::POST, "/session") => self.post_session(req).await,
            (&Method::GET, "/features") => Ok(make_json_response(&self.settings.feature_gates())?),
            (&Method::GET, p) if p.starts_with("/features/") => {
                let name = percent_decode_str(&p["/features/".len()..]).decode_utf8_lossy();
                let enabled = self.settings.feature_gates().is_enabled(&name)?;
                Ok(make_json_response(&BTreeMap::from([(name.as_ref(), enabled)]))?)
            }
            (&Method::GET, "/header-urls") => {
                Ok(make_json_response(&self.endpoints.header_urls().await)?)
            }
            _ => Ok(make_error_response(StatusCode::NOT_FOUND)),
        }
    }

    async fn post_session<B>(
        &self,
        req: Request<B>,
    ) -> Result<Response<BoxBody<Bytes, PortalError>>, PortalError>
    where
        B: Body,
        B::Error: Into<Box<dyn Error + Send + Sync>>,
    {
        let identity = self.identity.current_caller(req.headers())?;
        let params = request_parameters(req).await?;

        let forwarded = self.forwarder.forward_session(&identity, &params).await?;

        let mut response = Response::new(forwarded.body.map_err(PortalError::from).boxed());
        if let Some(content_type) = forwarded.content_type {
            response.headers_mut().insert(CONTENT_TYPE, content_type);
        }
        Ok(response)
    }
}

/// Parameters of the query string followed by those of a form-encoded body. Only the first
/// value of a repeated name is kept.
async fn request_parameters<B>(req: Request<B>) -> Result<Vec<(String, String)>, PortalError>
where
    B: Body,
    B::Error: Into<Box<dyn Error + Send + Sync>>,
{
    let mut params: IndexMap<String, String> = IndexMap::new();

    if let Some(query) = req.uri().query() {
        collect_pairs(&mut params, query.as_bytes());
    }

    let is_form = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(FORM_CONTENT_TYPE));

    let body = Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(PortalError::RequestBody)?
        .to_bytes();

    if is_form {
        collect_pairs(&mut params, &body);
    } else if !body.is_empty() {
        tracing::debug!(bytes = body.len(), "Ignoring request body that is not form encoded");
    }

    Ok(params.into_iter().collect())
}

fn collect_pairs(params: &mut IndexMap<String, String>, encoded: &[u8]) {
    for (name, value) in form_urlencoded::parse(encoded).into_owned() {
        params.entry(name).or_insert(value);
    }
}

fn error_response(
    status: StatusCode,
    error: &PortalError,
) -> Response<BoxBody<Bytes, PortalError>> {
    match error {
        PortalError::Config(_) if status.is_server_error() => {
            make_text_response(status, format!("{error}\n"))
        }
        _ => make_error_response(status),
    }
}
