use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::Request;
use tower::{Layer, Service};

/// Layer that logs every request's method and path, the same role the
/// teacher's `api/mod.rs` `LogLayer` plays for the TURN control plane.
#[derive(Default, Clone)]
pub struct LogLayer;

impl<S> Layer<S> for LogLayer {
    type Service = LogService<S>;

    fn layer(&self, service: S) -> Self::Service {
        LogService { service }
    }
}

/// Middleware that adds a request log line ahead of the inner service.
#[derive(Clone)]
pub struct LogService<S> {
    service: S,
}

impl<S> Service<Request<Body>> for LogService<S>
where
    S: Service<Request<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let mut service = self.service.clone();
        Box::pin(async move {
            log::info!("hub request: {method} {path}");
            service.call(req).await
        })
    }
}
