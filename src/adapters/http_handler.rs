use std::{
    convert::Infallible,
    sync::Arc,
    task::{Context as TaskContext, Poll},
};

use arc_swap::ArcSwap;
use axum::body::Body;
use futures_util::future::BoxFuture;
use http::{Request, Response};

use crate::{core::Dispatcher, ports::http_server::RequestHandler};

/// Tower service in front of a swappable [`Dispatcher`].
///
/// Each request runs against the dispatcher current at its arrival; a
/// [`swap`](Self::swap) never affects requests already in flight.
#[derive(Clone)]
pub struct HttpHandler {
    dispatcher: Arc<ArcSwap<Dispatcher>>,
}

impl HttpHandler {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(ArcSwap::from_pointee(dispatcher)),
        }
    }

    /// Share an existing holder, e.g. one a reload task also writes to.
    pub fn from_holder(dispatcher: Arc<ArcSwap<Dispatcher>>) -> Self {
        Self { dispatcher }
    }

    pub fn holder(&self) -> Arc<ArcSwap<Dispatcher>> {
        self.dispatcher.clone()
    }

    pub fn current(&self) -> Arc<Dispatcher> {
        self.dispatcher.load_full()
    }

    /// Install a freshly built dispatcher for subsequent requests.
    pub fn swap(&self, dispatcher: Dispatcher) {
        self.dispatcher.store(Arc::new(dispatcher));
        tracing::info!("Dispatcher replaced");
    }

    /// Main request entry point.
    pub async fn handle_request(&self, req: Request<Body>) -> Response<Body> {
        let dispatcher = self.dispatcher.load_full();
        dispatcher.handle(req).await
    }
}

impl RequestHandler for HttpHandler {
    fn handle(&self, req: Request<Body>) -> impl std::future::Future<Output = Response<Body>> + Send {
        self.handle_request(req)
    }
}

impl tower::Service<Request<Body>> for HttpHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let dispatcher = self.dispatcher.load_full();
        Box::pin(async move { Ok(dispatcher.handle(req).await) })
    }
}
