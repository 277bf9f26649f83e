//! Forwarding of session requests to the session service.
//!
//! A forward resolves the session service endpoint, POSTs the caller's parameters to it with the
//! caller's credentials attached, and relays the response body back as it arrives. Each forward
//! walks through [`ForwardState`]; the relay body finishes the walk once the last byte (or an
//! error) has been seen.

use crate::errors::{ForwardError, PortalError};
use crate::identity::CallerIdentity;
use crate::metrics_defs::{FORWARD_DURATION, FORWARD_REQUESTS};
use bytes::Bytes;
use futures_util::Stream;
use http::HeaderValue;
use http::header::CONTENT_TYPE;
use http_body_util::StreamBody;
use http_body_util::combinators::BoxBody;
use hyper::body::Frame;
use registry::{AuthMode, Capability, EndpointResolver, ServiceId};
use settings::ConfigurationResolver;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use url::Url;

const SESSION_PATH: &str = "/session";

pub type RelayBody = BoxBody<Bytes, ForwardError>;

/// Response of the session service, body still streaming.
pub struct ForwardResponse {
    pub content_type: Option<HeaderValue>,
    pub body: RelayBody,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForwardState {
    Init,
    ResolvingEndpoint,
    Calling,
    Streaming,
    Done,
    Failed,
}

impl ForwardState {
    pub fn can_advance_to(self, next: ForwardState) -> bool {
        use ForwardState::*;

        match (self, next) {
            (Init, ResolvingEndpoint)
            | (ResolvingEndpoint, Calling)
            | (Calling, Streaming)
            | (Streaming, Done) => true,
            (Done | Failed, Failed) => false,
            (_, Failed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ForwardState::Done | ForwardState::Failed)
    }
}

/// Progress of one forward.
#[derive(Debug)]
struct Attempt {
    state: ForwardState,
    started: Instant,
}

impl Attempt {
    fn start() -> Self {
        Attempt {
            state: ForwardState::Init,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: ForwardState) -> Result<(), ForwardError> {
        if !self.state.can_advance_to(next) {
            return Err(ForwardError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(from = ?self.state, to = ?next, "Forward state transition");
        self.state = next;
        Ok(())
    }

    fn fail<E: fmt::Display>(&mut self, error: E) -> E {
        let stage = self.state;
        if self.advance(ForwardState::Failed).is_ok() {
            tracing::warn!(?stage, %error, "Session forward failed");
            self.record("failure");
        }
        error
    }

    fn finish(&mut self, bytes: u64) {
        if self.advance(ForwardState::Done).is_ok() {
            tracing::debug!(bytes, "Session response relayed");
            self.record("success");
        }
    }

    fn record(&self, outcome: &'static str) {
        shared::counter!(FORWARD_REQUESTS, "outcome" => outcome).increment(1);
        shared::histogram!(FORWARD_DURATION, "outcome" => outcome)
            .record(self.started.elapsed().as_secs_f64());
    }
}

pub struct SessionForwarder {
    client: reqwest::Client,
    settings: Arc<ConfigurationResolver>,
    endpoints: EndpointResolver,
}

impl SessionForwarder {
    pub fn new(
        settings: Arc<ConfigurationResolver>,
        endpoints: EndpointResolver,
    ) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(ForwardError::Request)?;

        Ok(SessionForwarder {
            client,
            settings,
            endpoints,
        })
    }

    /// Resolves the configured session service and forwards to its session endpoint.
    pub async fn forward_session(
        &self,
        identity: &CallerIdentity,
        params: &[(String, String)],
    ) -> Result<ForwardResponse, PortalError> {
        let mut attempt = Attempt::start();
        attempt.advance(ForwardState::ResolvingEndpoint)?;

        let target = match self.session_url().await {
            Ok(target) => target,
            Err(error) => return Err(attempt.fail(error)),
        };

        Ok(self.send(attempt, &target, identity, params).await?)
    }

    /// Forwards to an already resolved `target`.
    pub async fn forward(
        &self,
        target: &Url,
        identity: &CallerIdentity,
        params: &[(String, String)],
    ) -> Result<ForwardResponse, ForwardError> {
        let mut attempt = Attempt::start();
        attempt.advance(ForwardState::ResolvingEndpoint)?;
        self.send(attempt, target, identity, params).await
    }

    /// Session endpoint of the configured session service.
    pub async fn session_url(&self) -> Result<Url, PortalError> {
        let id = ServiceId::new(self.settings.resource_id()?);
        let capability = Capability::new(self.settings.standard_id()?);

        let endpoint = self
            .endpoints
            .resolve_one(&id, &capability, Some(AuthMode::Token))
            .await;
        let base = endpoint.url.ok_or_else(|| ForwardError::Endpoint {
            id: id.to_string(),
        })?;

        Ok(session_endpoint(&base)?)
    }

    async fn send(
        &self,
        mut attempt: Attempt,
        target: &Url,
        identity: &CallerIdentity,
        params: &[(String, String)],
    ) -> Result<ForwardResponse, ForwardError> {
        attempt.advance(ForwardState::Calling)?;
        tracing::debug!(%target, params = params.len(), ?identity, "Forwarding session request");

        let response = match self
            .client
            .post(target.clone())
            .headers(identity.headers().clone())
            .form(params)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Err(attempt.fail(ForwardError::Request(e))),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(attempt.fail(ForwardError::Status(status)));
        }

        attempt.advance(ForwardState::Streaming)?;
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let relay = RelayStream {
            inner: Box::pin(response.bytes_stream()),
            attempt,
            bytes: 0,
        };

        Ok(ForwardResponse {
            content_type,
            body: BoxBody::new(StreamBody::new(relay)),
        })
    }
}

/// `base` with one trailing slash removed, followed by `/session`.
fn session_endpoint(base: &Url) -> Result<Url, ForwardError> {
    let base = base.as_str();
    let base = base.strip_suffix('/').unwrap_or(base);
    Ok(Url::parse(&format!("{base}{SESSION_PATH}"))?)
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send + Sync>>;

/// Passes the session service's body through chunk by chunk and closes the attempt when it ends.
struct RelayStream {
    inner: ByteStream,
    attempt: Attempt,
    bytes: u64,
}

impl Stream for RelayStream {
    type Item = Result<Frame<Bytes>, ForwardError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.attempt.state.is_terminal() {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes += chunk.len() as u64;
                Poll::Ready(Some(Ok(Frame::data(chunk))))
            }
            Poll::Ready(Some(Err(e))) => {
                Poll::Ready(Some(Err(this.attempt.fail(ForwardError::Body(e)))))
            }
            Poll::Ready(None) => {
                this.attempt.finish(this.bytes);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl RelayStream {
    /// Closes an unfinished relay as failed.
    fn abandon(&mut self) {
        if self.attempt.state == ForwardState::Streaming
            && self.attempt.advance(ForwardState::Failed).is_ok()
        {
            tracing::debug!(bytes = self.bytes, "Client went away before the relay finished");
            self.attempt.record("abandoned");
        }
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        self.abandon();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{HeaderIdentityProvider, IdentityProvider};
    use futures_util::StreamExt;
    use http::header::{AUTHORIZATION, COOKIE, HeaderMap, HeaderName, LOCATION};
    use http::StatusCode;
    use http_body_util::{BodyExt, Full};
    use hyper::body::Incoming;
    use hyper::service::service_fn;
    use hyper::{Request, Response};
    use hyper_util::rt::{TokioExecutor, TokioIo};
    use registry::RegistryClient;
    use registry::config::{CapabilityConfig, ServiceConfig};
    use registry::static_registry::StaticRegistry;
    use settings::{ConfigError, ConfigSource, Layer};
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    static REDIRECT_CALLS: AtomicUsize = AtomicUsize::new(0);

    const SESSIONS_STANDARD: &str = "vos://cadc.nrc.ca~vospace/CADC/std/Proc#sessions-1.0";

    const CHUNKS: [&[u8]; 4] = [
        b"\x00\x01\xfe\xff",
        b"first line\n",
        b"second line\r\n",
        b"no newline at the end",
    ];

    type TestBody = BoxBody<Bytes, Infallible>;

    fn full(bytes: impl Into<Bytes>) -> TestBody {
        Full::new(bytes.into()).boxed()
    }

    async fn session_handler(req: Request<Incoming>) -> Result<Response<TestBody>, Infallible> {
        let (parts, body) = req.into_parts();
        let form = body.collect().await.unwrap().to_bytes();
        let header = |name: HeaderName| {
            parts
                .headers
                .get_all(name)
                .iter()
                .map(|v| v.to_str().unwrap())
                .collect::<Vec<_>>()
                .join(" & ")
        };

        let response = match parts.uri.path() {
            "/echo/session" => {
                let echo = format!(
                    "authorization={}|cookie={}|content-type={}|form={}",
                    header(AUTHORIZATION),
                    header(COOKIE),
                    header(CONTENT_TYPE),
                    String::from_utf8_lossy(&form),
                );
                Response::new(full(echo))
            }
            "/stream/session" | "/skaha/v0/session" => {
                let frames = CHUNKS
                    .into_iter()
                    .map(|chunk| Ok::<_, Infallible>(Frame::data(Bytes::from_static(chunk))));
                let mut response =
                    Response::new(BodyExt::boxed(StreamBody::new(futures_util::stream::iter(frames))));
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/octet-stream"),
                );
                response
            }
            "/redirect/session" => {
                REDIRECT_CALLS.fetch_add(1, Ordering::SeqCst);
                let mut response = Response::new(full(""));
                *response.status_mut() = StatusCode::FOUND;
                response
                    .headers_mut()
                    .insert(LOCATION, HeaderValue::from_static("/elsewhere"));
                response
            }
            "/elsewhere" => {
                REDIRECT_CALLS.fetch_add(1, Ordering::SeqCst);
                Response::new(full(format!("{} /elsewhere", parts.method)))
            }
            "/fail/session" => {
                let mut response = Response::new(full("downstream exploded"));
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
            _ => {
                let mut response = Response::new(full("not found"));
                *response.status_mut() = StatusCode::NOT_FOUND;
                response
            }
        };
        Ok(response)
    }

    async fn start_session_service() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);
                tokio::spawn(async move {
                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service_fn(session_handler))
                        .await;
                });
            }
        });

        port
    }

    /// Answers the first request with `response` and closes the connection.
    async fn start_raw_service(response: &'static [u8]) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        port
    }

    fn forwarder(settings: &[(&str, &str)], services: Vec<ServiceConfig>) -> SessionForwarder {
        let settings = ConfigurationResolver::new(ConfigSource::new(vec![Layer::new(
            "test",
            settings.iter().copied(),
        )]));
        let client = RegistryClient::from_static(StaticRegistry::new(services));
        SessionForwarder::new(Arc::new(settings), EndpointResolver::from_client(client)).unwrap()
    }

    fn skaha_service(url: &str) -> ServiceConfig {
        ServiceConfig {
            id: "ivo://example.org/skaha".into(),
            capabilities: vec![CapabilityConfig {
                standard: SESSIONS_STANDARD.into(),
                url: Url::parse(url).unwrap(),
                auth: vec![AuthMode::Token],
            }],
        }
    }

    fn session_settings() -> Vec<(&'static str, &'static str)> {
        vec![
            ("org.opencadc.science-portal.sessions.resourceID", "ivo://example.org/skaha"),
            ("org.opencadc.science-portal.sessions.standard", SESSIONS_STANDARD),
        ]
    }

    fn caller() -> CallerIdentity {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        headers.append(COOKIE, HeaderValue::from_static("CADC_SSO=one"));
        HeaderIdentityProvider.current_caller(&headers).unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_state_transitions() {
        use ForwardState::*;

        let happy = [Init, ResolvingEndpoint, Calling, Streaming, Done];
        for pair in happy.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
        for state in [Init, ResolvingEndpoint, Calling, Streaming] {
            assert!(state.can_advance_to(Failed), "{state:?} -> Failed");
        }

        assert!(!Done.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Failed));
        assert!(!Init.can_advance_to(Calling));
        assert!(!Streaming.can_advance_to(Calling));
        assert!(!Failed.can_advance_to(Streaming));

        let mut attempt = Attempt::start();
        assert!(matches!(
            attempt.advance(Streaming),
            Err(ForwardError::IllegalTransition { from: Init, to: Streaming })
        ));
        assert_eq!(attempt.state, Init);
    }

    #[test]
    fn test_session_endpoint() {
        let cases = [
            ("https://ws.example.org/skaha/v0", "https://ws.example.org/skaha/v0/session"),
            ("https://ws.example.org/skaha/v0/", "https://ws.example.org/skaha/v0/session"),
            ("https://ws.example.org", "https://ws.example.org/session"),
        ];
        for (base, expected) in cases {
            let url = session_endpoint(&Url::parse(base).unwrap()).unwrap();
            assert_eq!(url.as_str(), expected);
        }
    }

    #[tokio::test]
    async fn test_forward_relays_exact_bytes() {
        let port = start_session_service().await;
        let target = Url::parse(&format!("http://127.0.0.1:{port}/stream/session")).unwrap();

        let response = forwarder(&[], vec![])
            .forward(&target, &caller(), &[])
            .await
            .unwrap();
        assert_eq!(
            response.content_type,
            Some(HeaderValue::from_static("application/octet-stream"))
        );

        let body = response.body.collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from(CHUNKS.concat()));
    }

    #[tokio::test]
    async fn test_forward_sends_form_and_credentials() {
        let port = start_session_service().await;
        let target = Url::parse(&format!("http://127.0.0.1:{port}/echo/session")).unwrap();
        let params = params(&[("name", "my notebook"), ("image", "images/notebook:1.0")]);

        let response = forwarder(&[], vec![])
            .forward(&target, &caller(), &params)
            .await
            .unwrap();
        let body = response.body.collect().await.unwrap().to_bytes();

        assert_eq!(
            String::from_utf8(body.to_vec()).unwrap(),
            "authorization=Bearer abc123|cookie=CADC_SSO=one\
             |content-type=application/x-www-form-urlencoded\
             |form=name=my+notebook&image=images%2Fnotebook%3A1.0"
        );
    }

    #[tokio::test]
    async fn test_forward_non_success_status() {
        let port = start_session_service().await;
        let target = Url::parse(&format!("http://127.0.0.1:{port}/fail/session")).unwrap();

        let result = forwarder(&[], vec![]).forward(&target, &caller(), &[]).await;
        assert!(matches!(
            result,
            Err(ForwardError::Status(StatusCode::INTERNAL_SERVER_ERROR))
        ));
    }

    #[tokio::test]
    async fn test_forward_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let target = Url::parse(&format!("http://127.0.0.1:{port}/session")).unwrap();
        let result = forwarder(&[], vec![]).forward(&target, &caller(), &[]).await;
        assert!(matches!(result, Err(ForwardError::Request(_))));
    }

    #[tokio::test]
    async fn test_forward_session_resolves_endpoint() {
        let port = start_session_service().await;
        let forwarder = forwarder(
            &session_settings(),
            vec![skaha_service(&format!("http://127.0.0.1:{port}/skaha/v0/"))],
        );

        assert_eq!(
            forwarder.session_url().await.unwrap().as_str(),
            format!("http://127.0.0.1:{port}/skaha/v0/session")
        );

        let response = forwarder.forward_session(&caller(), &[]).await.unwrap();
        let body = response.body.collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from(CHUNKS.concat()));
    }

    #[tokio::test]
    async fn test_forward_session_missing_config() {
        let forwarder = forwarder(&[], vec![skaha_service("https://ws.example.org/skaha/v0")]);

        let result = forwarder.forward_session(&caller(), &[]).await;
        assert!(matches!(
            result,
            Err(PortalError::Config(ConfigError::MissingConfig { .. }))
        ));
    }

    #[tokio::test]
    async fn test_forward_session_unresolved_endpoint() {
        let forwarder = forwarder(&session_settings(), vec![]);

        let result = forwarder.forward_session(&caller(), &[]).await;
        assert!(matches!(
            result,
            Err(PortalError::Forward(ForwardError::Endpoint { .. }))
        ));
    }

    #[tokio::test]
    async fn test_forward_does_not_follow_redirects() {
        let port = start_session_service().await;
        let target = Url::parse(&format!("http://127.0.0.1:{port}/redirect/session")).unwrap();

        let result = forwarder(&[], vec![])
            .forward(&target, &caller(), &params(&[("a", "1")]))
            .await;
        assert!(matches!(result, Err(ForwardError::Status(StatusCode::FOUND))));
        assert_eq!(REDIRECT_CALLS.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_forward_interrupted_body() {
        let port =
            start_raw_service(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nabc").await;
        let target = Url::parse(&format!("http://127.0.0.1:{port}/session")).unwrap();

        let mut body = forwarder(&[], vec![])
            .forward(&target, &caller(), &[])
            .await
            .unwrap()
            .body;

        let mut relayed = Vec::new();
        let error = loop {
            match body.frame().await {
                Some(Ok(frame)) => relayed.extend_from_slice(&frame.into_data().unwrap()),
                Some(Err(error)) => break error,
                None => panic!("relay ended without an error"),
            }
        };
        assert_eq!(relayed, b"abc");
        assert!(matches!(error, ForwardError::Body(_)));
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn test_relay_abandoned_mid_stream() {
        let mut attempt = Attempt::start();
        for state in [
            ForwardState::ResolvingEndpoint,
            ForwardState::Calling,
            ForwardState::Streaming,
        ] {
            attempt.advance(state).unwrap();
        }
        let partial = Ok::<_, reqwest::Error>(Bytes::from_static(b"partial"));
        let chunks = futures_util::stream::iter([partial]).chain(futures_util::stream::pending());
        let mut relay = RelayStream {
            inner: Box::pin(chunks),
            attempt,
            bytes: 0,
        };

        let frame = relay.next().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), Bytes::from_static(b"partial"));
        assert_eq!(relay.bytes, 7);
        assert_eq!(relay.attempt.state, ForwardState::Streaming);

        relay.abandon();
        assert_eq!(relay.attempt.state, ForwardState::Failed);
        assert!(relay.next().await.is_none());
    }
}
