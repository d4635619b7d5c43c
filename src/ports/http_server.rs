use axum::body::Body;
use http::{Request, Response};

/// RequestHandler defines the port a transport uses to serve one request.
///
/// The implementation never fails at this boundary: every error has already
/// been rendered into a response by the centralized error handler.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, req: Request<Body>) -> impl std::future::Future<Output = Response<Body>> + Send;
}
