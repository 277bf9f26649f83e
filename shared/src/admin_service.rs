use crate::http::{make_error_response, make_text_response};
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

/// Health and readiness endpoints served on the admin listener.
///
/// `readiness_problems` returns the reasons the process cannot serve traffic yet. An empty list
/// means ready.
pub struct AdminService<F, E> {
    readiness_problems: F,
    _error: PhantomData<fn() -> E>,
}

impl<F, E> AdminService<F, E>
where
    F: Fn() -> Vec<String>,
{
    pub fn new(readiness_problems: F) -> Self {
        Self {
            readiness_problems,
            _error: PhantomData,
        }
    }
}

impl<B, F, E> Service<Request<B>> for AdminService<F, E>
where
    F: Fn() -> Vec<String>,
    E: Send + 'static,
{
    type Response = Response<BoxBody<Bytes, E>>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let res = match (req.method(), req.uri().path()) {
            (&Method::GET, "/health") => make_text_response(StatusCode::OK, "ok\n"),
            (&Method::GET, "/ready") => {
                let problems = (self.readiness_problems)();
                if problems.is_empty() {
                    make_text_response(StatusCode::OK, "ok\n")
                } else {
                    tracing::debug!(?problems, "Readiness check failed");
                    let mut body = problems.join("\n");
                    body.push('\n');
                    make_text_response(StatusCode::SERVICE_UNAVAILABLE, body)
                }
            }
            _ => make_error_response(StatusCode::NOT_FOUND),
        };

        Box::pin(async move { Ok(res) })
    }
}
