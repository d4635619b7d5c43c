//! Request-scoped state handed to every handler and middleware.
//!
//! A [`Context`] is recycled through the dispatcher's pool: [`Context::reset`]
//! rebinds it to a new request and [`Recycle::recycle`] drops everything that
//! belonged to the previous one (request, response, parameter values, store,
//! matched route and handler) while keeping allocated buffers around.
use std::{any::Any, collections::HashMap, fmt, net::SocketAddr, sync::Arc};

use axum::{body::Body, extract::ConnectInfo};
use bytes::{Bytes, BytesMut};
use eyre::{Result, WrapErr};
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, header};
use serde::Serialize;

use crate::{
    adapters::error_handler::DefaultErrorHandler,
    core::{
        error::HttpError,
        handler::Handler,
        method::MethodSet,
        params::PathParams,
        pool::Recycle,
        route::Route,
    },
    ports::error_handler::ErrorHandler,
};

pub const HEADER_X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const HEADER_X_REAL_IP: &str = "x-real-ip";
pub const HEADER_X_REQUEST_ID: &str = "x-request-id";

const MIME_TEXT_PLAIN: &str = "text/plain; charset=UTF-8";
const MIME_APPLICATION_JSON: &str = "application/json";

/// Buffered response under construction.
///
/// The status line is frozen by the first [`write_header`](Self::write_header)
/// (or the first body write, which implies `200`). Once committed, later
/// attempts to change the status are ignored, which is what keeps the
/// centralized error handler from writing a response twice.
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    committed: bool,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            committed: false,
        }
    }
}

impl ResponseWriter {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn committed(&self) -> bool {
        self.committed
    }

    /// Bytes written to the body so far.
    pub fn size(&self) -> usize {
        self.body.len()
    }

    pub fn write_header(&mut self, status: StatusCode) {
        if self.committed {
            tracing::debug!(
                "Response already committed with {}, ignoring status {}",
                self.status,
                status
            );
            return;
        }
        self.status = status;
        self.committed = true;
    }

    pub fn write(&mut self, chunk: &[u8]) {
        if !self.committed {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(chunk);
    }

    /// Move the buffered response out, leaving the writer ready for reuse.
    pub fn take(&mut self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body.split().freeze()));
        *response.status_mut() = self.status;
        *response.headers_mut() = std::mem::take(&mut self.headers);
        self.status = StatusCode::OK;
        self.committed = false;
        response
    }

    fn clear(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
        self.committed = false;
    }
}

/// Per-request state: request, buffered response, path parameters, the
/// matched route and a typed key/value store for middleware.
pub struct Context {
    request: Request<Body>,
    response: ResponseWriter,
    params: PathParams,
    route: Option<Arc<Route>>,
    handler: Option<Handler>,
    allowed: MethodSet,
    store: HashMap<String, Box<dyn Any + Send + Sync>>,
    error_handler: Arc<dyn ErrorHandler>,
    debug: bool,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", self.request.method())
            .field("uri", self.request.uri())
            .field("route", &self.route.as_ref().map(|r| r.name.as_str()))
            .field("params", &self.params.values())
            .field("committed", &self.response.committed)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub(crate) fn new(
        error_handler: Arc<dyn ErrorHandler>,
        debug: bool,
        param_capacity: usize,
    ) -> Self {
        Self {
            request: Request::new(Body::empty()),
            response: ResponseWriter::default(),
            params: PathParams::with_capacity(param_capacity),
            route: None,
            handler: None,
            allowed: MethodSet::empty(),
            store: HashMap::new(),
            error_handler,
            debug,
        }
    }

    /// A context outside any dispatcher, using the default error handler.
    /// Useful for driving handlers and middleware directly in tests.
    pub fn detached() -> Self {
        Self::new(Arc::new(DefaultErrorHandler), false, 0)
    }

    /// Rebind to a new request. Everything else starts out empty.
    pub fn reset(&mut self, request: Request<Body>) {
        self.recycle();
        self.request = request;
    }

    pub fn request(&self) -> &Request<Body> {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request<Body> {
        &mut self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// Path of the request URI, as received.
    pub fn request_path(&self) -> &str {
        self.request.uri().path()
    }

    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseWriter {
        &mut self.response
    }

    pub(crate) fn take_response(&mut self) -> Response<Body> {
        self.response.take()
    }

    /// Consume the request body, up to `limit` bytes.
    pub async fn read_body(&mut self, limit: usize) -> Result<Bytes> {
        let body = std::mem::replace(self.request.body_mut(), Body::empty());
        axum::body::to_bytes(body, limit)
            .await
            .map_err(|e| HttpError::bad_request().with_internal(e).into())
    }

    // --- routing outcome ---

    /// Registered pattern of the matched route, or `""` when nothing matched.
    pub fn path(&self) -> &str {
        self.route.as_ref().map_or("", |route| route.path.as_str())
    }

    pub fn route(&self) -> Option<&Arc<Route>> {
        self.route.as_ref()
    }

    pub fn handler(&self) -> Option<&Handler> {
        self.handler.as_ref()
    }

    /// Methods the matched path accepts when the outcome was 405.
    pub fn allowed_methods(&self) -> MethodSet {
        self.allowed
    }

    /// The request alongside the parameter buffer, for the router lookup.
    pub(crate) fn lookup_parts(&mut self) -> (&Request<Body>, &mut PathParams) {
        (&self.request, &mut self.params)
    }

    pub(crate) fn params_mut(&mut self) -> &mut PathParams {
        &mut self.params
    }

    pub(crate) fn set_outcome(
        &mut self,
        route: Option<Arc<Route>>,
        handler: Handler,
        allowed: MethodSet,
    ) {
        self.route = route;
        self.handler = Some(handler);
        self.allowed = allowed;
    }

    /// Value captured for `name`; the wildcard capture is named `*`.
    pub fn param(&self, name: &str) -> Option<&str> {
        let index = self.param_names().iter().position(|n| n == name)?;
        self.params.get(index)
    }

    pub fn param_names(&self) -> &[String] {
        self.route
            .as_ref()
            .map(|route| route.params.as_slice())
            .unwrap_or(&[])
    }

    pub fn param_values(&self) -> &[String] {
        self.params.values()
    }

    /// Replace the captured value of `name`, e.g. after decoding it.
    pub fn set_param(&mut self, name: &str, value: &str) {
        if let Some(index) = self.param_names().iter().position(|n| n == name) {
            self.params.set(index, value);
        }
    }

    /// First value of a query string parameter, percent-decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.request.uri().query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Client address from `X-Forwarded-For`, then `X-Real-IP`, then the
    /// peer address recorded by the server.
    pub fn real_ip(&self) -> Option<String> {
        let headers = self.request.headers();
        if let Some(forwarded) = headers
            .get(HEADER_X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
        {
            if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
                return Some(first.to_string());
            }
        }
        if let Some(real_ip) = headers.get(HEADER_X_REAL_IP).and_then(|v| v.to_str().ok()) {
            return Some(real_ip.trim().to_string());
        }
        self.request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    }

    // --- store ---

    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.store.insert(key.into(), Box::new(value));
    }

    /// Stored value under `key`, if present and of type `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.store.get(key).and_then(|value| value.downcast_ref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.contains_key(key)
    }

    // --- responses ---

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn string(&mut self, status: StatusCode, body: impl AsRef<str>) {
        self.blob(status, MIME_TEXT_PLAIN, body.as_ref().as_bytes());
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) -> Result<()> {
        let body = serde_json::to_vec(value).wrap_err("Failed to encode JSON response")?;
        self.blob(status, MIME_APPLICATION_JSON, &body);
        Ok(())
    }

    pub fn blob(&mut self, status: StatusCode, content_type: &'static str, body: &[u8]) {
        self.response
            .headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.response.write_header(status);
        self.response.write(body);
    }

    pub fn no_content(&mut self, status: StatusCode) {
        self.response.write_header(status);
    }

    /// Redirect to `location`. `status` must be a 3xx code.
    pub fn redirect(&mut self, status: StatusCode, location: &str) -> Result<()> {
        if !status.is_redirection() {
            return Err(HttpError::with_message(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Invalid redirect status code {}", status.as_u16()),
            )
            .into());
        }
        let value = HeaderValue::from_str(location)
            .map_err(|e| HttpError::internal().with_internal(e))?;
        self.response.headers.insert(header::LOCATION, value);
        self.response.write_header(status);
        Ok(())
    }

    /// Render `err` through the centralized error handler right away.
    ///
    /// Middleware that needs to observe the final status (access logs) calls
    /// this instead of returning the error to the dispatcher. Once the
    /// response is committed the error is logged and dropped; the handler is
    /// not invoked.
    pub fn error(&mut self, err: eyre::Report) {
        if self.response.committed() {
            tracing::debug!(
                "Dropping error for {} {}, response already committed: {:#}",
                self.method(),
                self.request_path(),
                err
            );
            return;
        }
        let handler = self.error_handler.clone();
        handler.handle_error(err, self);
    }
}

impl Recycle for Context {
    fn recycle(&mut self) {
        self.request = Request::new(Body::empty());
        self.response.clear();
        self.params.clear();
        self.route = None;
        self.handler = None;
        self.allowed = MethodSet::empty();
        self.store.clear();
    }
}
