//! Per-request pipeline.
//!
//! For each request the dispatcher:
//! - acquires a [`Context`] from the pool and binds it to the request
//! - runs pre-routing middleware, if any, around the steps below
//! - picks the router for the request's host (default router otherwise)
//! - looks the path up and records the outcome on the context
//! - runs the matched handler wrapped in the global middleware
//! - hands a returned error to the centralized error handler
//! - releases the context, also when the future is dropped or unwinds
use std::{collections::HashMap, sync::Arc};

use axum::body::Body;
use http::{Method, Request, Response, header};

use crate::{
    config::models::DispatcherConfig,
    core::{
        context::Context,
        error::ReverseError,
        handler::{
            Handler, Middleware, apply_middleware, handler_fn, method_not_allowed_handler,
            not_found_handler, options_handler,
        },
        method::MethodSet,
        pool::Pool,
        route::Route,
        router::{RouteMatch, Router},
    },
    ports::{error_handler::ErrorHandler, http_server::RequestHandler},
};

/// Immutable routing state shared with the pre-middleware entry handler.
struct RouteTable {
    router: Router,
    hosts: HashMap<String, Router>,
    middleware: Vec<Middleware>,
    not_found: Handler,
    method_not_allowed: Handler,
    options: Handler,
}

impl RouteTable {
    fn router_for(&self, host: Option<&str>) -> &Router {
        host.and_then(|host| host_entry(&self.hosts, host))
            .unwrap_or(&self.router)
    }

    /// Look the request up and record the outcome on `c`.
    fn resolve(&self, c: &mut Context) -> Handler {
        let (request, params) = c.lookup_parts();
        let router = self.router_for(request_host(request));

        let (route, handler, allowed) =
            match router.find(request.method(), request.uri().path(), params) {
                RouteMatch::Found(endpoint) => (
                    Some(endpoint.route.clone()),
                    endpoint.handler.clone(),
                    MethodSet::empty(),
                ),
                RouteMatch::MethodNotAllowed(allowed) if *request.method() == Method::OPTIONS => {
                    (None, self.options.clone(), allowed)
                }
                RouteMatch::MethodNotAllowed(allowed) => {
                    (None, self.method_not_allowed.clone(), allowed)
                }
                RouteMatch::NotFound => (None, self.not_found.clone(), MethodSet::empty()),
            };

        c.set_outcome(route, handler.clone(), allowed);
        handler
    }

    async fn route_and_run(&self, c: &mut Context) -> eyre::Result<()> {
        let handler = self.resolve(c);
        if self.middleware.is_empty() {
            handler(c).await
        } else {
            apply_middleware(handler, &self.middleware)(c).await
        }
    }
}

/// Router registered for `host`. Keys are stored lower-case; the request
/// host is only lowered when it contains upper-case letters.
fn host_entry<'h>(hosts: &'h HashMap<String, Router>, host: &str) -> Option<&'h Router> {
    if host.bytes().any(|byte| byte.is_ascii_uppercase()) {
        hosts.get(&host.to_ascii_lowercase())
    } else {
        hosts.get(host)
    }
}

/// Host the request addresses: the `Host` header, or the URI authority for
/// HTTP/2 requests that carry none.
fn request_host(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().authority().map(|authority| authority.as_str()))
}

/// Frozen application: routers, middleware and the context pool.
///
/// Built by [`AppBuilder::build`](crate::core::AppBuilder::build). It offers no
/// way to register routes, so lookups never race with mutation; reconfiguring
/// means building a new dispatcher and swapping it in.
pub struct Dispatcher {
    table: Arc<RouteTable>,
    /// Pre-middleware composed around routing; `None` when there is none.
    entry: Option<Handler>,
    pool: Pool<Context>,
    debug: bool,
}

impl Dispatcher {
    pub(crate) fn new(
        router: Router,
        hosts: HashMap<String, Router>,
        pre: Vec<Middleware>,
        middleware: Vec<Middleware>,
        error_handler: Arc<dyn ErrorHandler>,
        config: &DispatcherConfig,
        max_params: usize,
    ) -> Self {
        let table = Arc::new(RouteTable {
            router,
            hosts,
            middleware,
            not_found: not_found_handler(),
            method_not_allowed: method_not_allowed_handler(),
            options: options_handler(),
        });

        let entry = (!pre.is_empty()).then(|| {
            let table = table.clone();
            let routing = handler_fn(move |c| {
                let table = table.clone();
                Box::pin(async move { table.route_and_run(c).await })
            });
            apply_middleware(routing, &pre)
        });

        let debug = config.debug;
        let pool = Pool::new(config.max_idle_contexts, move || {
            Context::new(error_handler.clone(), debug, max_params)
        });

        Self {
            table,
            entry,
            pool,
            debug,
        }
    }

    /// Serve one request. Errors never escape: they are rendered by the
    /// centralized error handler.
    pub async fn serve(&self, request: Request<Body>) -> Response<Body> {
        let mut guard = self.pool.acquire();
        let ctx: &mut Context = &mut guard;
        ctx.reset(request);

        let result = match &self.entry {
            Some(entry) => entry(ctx).await,
            None => self.table.route_and_run(ctx).await,
        };
        if let Err(err) = result {
            ctx.error(err);
        }

        ctx.take_response()
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// The router used when the request's host has no router of its own.
    pub fn router(&self) -> &Router {
        &self.table.router
    }

    pub fn host_router(&self, host: &str) -> Option<&Router> {
        host_entry(&self.table.hosts, host)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.table.hosts.keys().map(String::as_str)
    }

    /// Routes of the default router in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.table.router.routes()
    }

    /// URL for a named route of the default router.
    pub fn reverse<S: AsRef<str>>(&self, name: &str, values: &[S]) -> Result<String, ReverseError> {
        self.table.router.reverse(name, values)
    }

    /// URL for a named route of a host router.
    pub fn reverse_for_host<S: AsRef<str>>(
        &self,
        host: &str,
        name: &str,
        values: &[S],
    ) -> Result<String, ReverseError> {
        self.host_router(host)
            .ok_or_else(|| ReverseError::UnknownRoute {
                name: format!("{name} (host '{host}')"),
            })?
            .reverse(name, values)
    }

    /// Contexts currently parked in the pool.
    pub fn idle_contexts(&self) -> usize {
        self.pool.idle_count()
    }
}

impl RequestHandler for Dispatcher {
    fn handle(&self, req: Request<Body>) -> impl std::future::Future<Output = Response<Body>> + Send {
        self.serve(req)
    }
}
