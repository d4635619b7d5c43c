//! Setup-time registration API.
//!
//! [`AppBuilder`] collects routes (per virtual host), middleware and settings,
//! and [`AppBuilder::build`] freezes them into an immutable [`Dispatcher`].
//! Registration helpers live on the [`Registrar`] trait so that the builder
//! and every [`Group`] expose the same surface.
use std::{collections::HashMap, iter, sync::Arc};

use crate::{
    adapters::error_handler::DefaultErrorHandler,
    config::models::DispatcherConfig,
    core::{
        dispatcher::Dispatcher,
        error::RouteResult,
        handler::{Handler, Middleware, apply_middleware},
        method::RouteMethod,
        route::Route,
        router::Router,
    },
    ports::error_handler::ErrorHandler,
};

/// Callback observing every registration: `(host, route)`.
pub type AddRouteHook = Arc<dyn Fn(Option<&str>, &Route) + Send + Sync>;

/// Optional settings for a single registration.
#[derive(Default, Clone)]
pub struct RouteOptions {
    /// Name used for reverse lookups. Defaults to `"<METHOD> <path>"`.
    pub name: Option<String>,
    /// Route-level middleware, outermost first.
    pub middleware: Vec<Middleware>,
}

impl RouteOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            middleware: Vec::new(),
        }
    }

    pub fn with_middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }
}

/// Route registration helpers shared by [`AppBuilder`] and [`Group`].
pub trait Registrar {
    /// Register `handler` for a method of the fixed verb set (or the
    /// not-found sentinel).
    fn add_route(
        &mut self,
        method: RouteMethod,
        path: &str,
        options: RouteOptions,
        handler: Handler,
    ) -> RouteResult<Arc<Route>>;

    /// Register by method name. Unknown verbs are rejected.
    fn add(&mut self, method: &str, path: &str, handler: Handler) -> RouteResult<Arc<Route>> {
        self.add_with(method, path, RouteOptions::default(), handler)
    }

    fn add_with(
        &mut self,
        method: &str,
        path: &str,
        options: RouteOptions,
        handler: Handler,
    ) -> RouteResult<Arc<Route>> {
        let method = method.parse()?;
        self.add_route(method, path, options, handler)
    }

    fn connect(&mut self, path: &str, handler: Handler) -> RouteResult<Arc<Route>> {
        self.add_route(RouteMethod::Connect, path, RouteOptions::default(), handler)
    }

    fn delete(&mut self, path: &str, handler: Handler) -> RouteResult<Arc<Route>> {
        self.add_route(RouteMethod::Delete, path, RouteOptions::default(), handler)
    }

    fn get(&mut self, path: &str, handler: Handler) -> RouteResult<Arc<Route>> {
        self.add_route(RouteMethod::Get, path, RouteOptions::default(), handler)
    }

    fn head(&mut self, path: &str, handler: Handler) -> RouteResult<Arc<Route>> {
        self.add_route(RouteMethod::Head, path, RouteOptions::default(), handler)
    }

    fn options(&mut self, path: &str, handler: Handler) -> RouteResult<Arc<Route>> {
        self.add_route(RouteMethod::Options, path, RouteOptions::default(), handler)
    }

    fn patch(&mut self, path: &str, handler: Handler) -> RouteResult<Arc<Route>> {
        self.add_route(RouteMethod::Patch, path, RouteOptions::default(), handler)
    }

    fn post(&mut self, path: &str, handler: Handler) -> RouteResult<Arc<Route>> {
        self.add_route(RouteMethod::Post, path, RouteOptions::default(), handler)
    }

    fn put(&mut self, path: &str, handler: Handler) -> RouteResult<Arc<Route>> {
        self.add_route(RouteMethod::Put, path, RouteOptions::default(), handler)
    }

    fn trace(&mut self, path: &str, handler: Handler) -> RouteResult<Arc<Route>> {
        self.add_route(RouteMethod::Trace, path, RouteOptions::default(), handler)
    }

    /// Register `handler` for every verb of the fixed set.
    fn any(&mut self, path: &str, handler: Handler) -> RouteResult<Vec<Arc<Route>>> {
        RouteMethod::VERBS
            .into_iter()
            .map(|method| self.add_route(method, path, RouteOptions::default(), handler.clone()))
            .collect()
    }

    /// Register `handler` for each listed method. All names are checked
    /// before anything is registered.
    fn match_methods(
        &mut self,
        methods: &[&str],
        path: &str,
        handler: Handler,
    ) -> RouteResult<Vec<Arc<Route>>> {
        let methods = methods
            .iter()
            .map(|method| method.parse::<RouteMethod>())
            .collect::<RouteResult<Vec<_>>>()?;
        methods
            .into_iter()
            .map(|method| self.add_route(method, path, RouteOptions::default(), handler.clone()))
            .collect()
    }

    /// Handler for requests under `path` that match no other route, e.g.
    /// `/api/*` for a JSON 404 below `/api`.
    fn route_not_found(&mut self, path: &str, handler: Handler) -> RouteResult<Arc<Route>> {
        self.add_route(
            RouteMethod::RouteNotFound,
            path,
            RouteOptions::default(),
            handler,
        )
    }
}

/// Mutable setup state. Nothing here is reachable once [`build`](Self::build)
/// has produced the dispatcher.
pub struct AppBuilder {
    router: Router,
    hosts: HashMap<String, Router>,
    pre: Vec<Middleware>,
    middleware: Vec<Middleware>,
    hooks: Vec<AddRouteHook>,
    error_handler: Arc<dyn ErrorHandler>,
    config: DispatcherConfig,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            hosts: HashMap::new(),
            pre: Vec::new(),
            middleware: Vec::new(),
            hooks: Vec::new(),
            error_handler: Arc::new(DefaultErrorHandler),
            config: DispatcherConfig::default(),
        }
    }

    pub fn with_config(&mut self, config: &DispatcherConfig) -> &mut Self {
        self.config = config.clone();
        self
    }

    pub fn debug(&mut self, debug: bool) -> &mut Self {
        self.config.debug = debug;
        self
    }

    pub fn max_idle_contexts(&mut self, max_idle: usize) -> &mut Self {
        self.config.max_idle_contexts = max_idle;
        self
    }

    pub fn error_handler(&mut self, handler: impl ErrorHandler) -> &mut Self {
        self.error_handler = Arc::new(handler);
        self
    }

    /// Middleware run before routing. It may short-circuit by returning an
    /// error, in which case no lookup happens.
    pub fn pre(&mut self, middleware: Middleware) -> &mut Self {
        self.pre.push(middleware);
        self
    }

    /// Middleware run after routing around every matched handler, including
    /// the not-found and method-not-allowed handlers.
    pub fn wrap(&mut self, middleware: Middleware) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    pub fn on_add_route(
        &mut self,
        hook: impl Fn(Option<&str>, &Route) + Send + Sync + 'static,
    ) -> &mut Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Routes registered through the group get `prefix` prepended and
    /// `middleware` applied outside their own route middleware.
    pub fn group(
        &mut self,
        prefix: &str,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> Group<'_> {
        Group {
            app: self,
            host: None,
            prefix: prefix.to_string(),
            middleware: middleware.into_iter().collect(),
        }
    }

    /// Routes registered through the group only serve requests whose `Host`
    /// equals `name`, ignoring ASCII case. The port, if any, must match.
    pub fn host(
        &mut self,
        name: &str,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> Group<'_> {
        Group {
            app: self,
            host: Some(name.to_ascii_lowercase()),
            prefix: String::new(),
            middleware: middleware.into_iter().collect(),
        }
    }

    fn register(
        &mut self,
        host: Option<&str>,
        method: RouteMethod,
        path: &str,
        options: RouteOptions,
        inherited: &[Middleware],
        handler: Handler,
    ) -> RouteResult<Arc<Route>> {
        let RouteOptions { name, middleware } = options;
        let chain: Vec<Middleware> = inherited.iter().cloned().chain(middleware).collect();
        let handler = apply_middleware(handler, &chain);

        let router = match host {
            Some(host) => self
                .hosts
                .entry(host.to_string())
                .or_insert_with(|| Router::for_host(host)),
            None => &mut self.router,
        };
        let route = router.add(method, path, name, handler)?;

        for hook in &self.hooks {
            hook(host, &route);
        }
        Ok(route)
    }

    /// Freeze the registered state into a dispatcher.
    pub fn build(self) -> Dispatcher {
        let max_params = iter::once(&self.router)
            .chain(self.hosts.values())
            .map(Router::max_params)
            .max()
            .unwrap_or(0);
        let route_count: usize = iter::once(&self.router)
            .chain(self.hosts.values())
            .map(Router::len)
            .sum();
        tracing::info!(
            "Built dispatcher with {} routes across {} host(s), {} pre / {} global middleware",
            route_count,
            self.hosts.len() + 1,
            self.pre.len(),
            self.middleware.len()
        );

        Dispatcher::new(
            self.router,
            self.hosts,
            self.pre,
            self.middleware,
            self.error_handler,
            &self.config,
            max_params,
        )
    }
}

impl Registrar for AppBuilder {
    fn add_route(
        &mut self,
        method: RouteMethod,
        path: &str,
        options: RouteOptions,
        handler: Handler,
    ) -> RouteResult<Arc<Route>> {
        self.register(None, method, path, options, &[], handler)
    }
}

/// Registration scope sharing a path prefix, host and middleware.
pub struct Group<'a> {
    app: &'a mut AppBuilder,
    host: Option<String>,
    prefix: String,
    middleware: Vec<Middleware>,
}

impl Group<'_> {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Append group middleware. Only routes registered afterwards see it.
    pub fn wrap(&mut self, middleware: Middleware) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Nested group inheriting this group's prefix, host and middleware.
    pub fn group(
        &mut self,
        prefix: &str,
        middleware: impl IntoIterator<Item = Middleware>,
    ) -> Group<'_> {
        Group {
            app: &mut *self.app,
            host: self.host.clone(),
            prefix: format!("{}{}", self.prefix, prefix),
            middleware: self.middleware.iter().cloned().chain(middleware).collect(),
        }
    }
}

impl Registrar for Group<'_> {
    fn add_route(
        &mut self,
        method: RouteMethod,
        path: &str,
        options: RouteOptions,
        handler: Handler,
    ) -> RouteResult<Arc<Route>> {
        let path = format!("{}{}", self.prefix, path);
        self.app.register(
            self.host.as_deref(),
            method,
            &path,
            options,
            &self.middleware,
            handler,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::core::{error::RouteError, handler::handler_fn};

    fn noop() -> Handler {
        handler_fn(|_| Box::pin(async { Ok(()) }))
    }

    #[test]
    fn test_unknown_method_rejected() {
        let mut app = AppBuilder::new();
        assert!(matches!(
            app.add("BREW", "/coffee", noop()),
            Err(RouteError::UnknownMethod { .. })
        ));
        assert!(app.add("PROPFIND", "/dav", noop()).is_ok());
    }

    #[test]
    fn test_match_methods_is_all_or_nothing() {
        let mut app = AppBuilder::new();
        assert!(app.match_methods(&["GET", "BREW"], "/x", noop()).is_err());
        assert_eq!(app.build().routes().count(), 0);
    }

    #[test]
    fn test_any_registers_every_verb() {
        let mut app = AppBuilder::new();
        let routes = app.any("/all", noop()).unwrap();
        assert_eq!(routes.len(), RouteMethod::VERBS.len());
        assert!(routes.iter().all(|r| r.path == "/all"));
    }

    #[test]
    fn test_groups_nest_prefixes_and_hosts() {
        let mut app = AppBuilder::new();
        {
            let mut api = app.group("/api", []);
            api.get("/status", noop()).unwrap();
            let mut v1 = api.group("/v1", []);
            v1.get("/users/:id", noop()).unwrap();
        }
        {
            let mut admin = app.host("admin.example.com", []);
            admin.get("/", noop()).unwrap();
            admin.group("/tools", []).get("/purge", noop()).unwrap();
        }

        let dispatcher = app.build();
        let default_paths: Vec<_> = dispatcher.routes().map(|r| r.path.clone()).collect();
        assert_eq!(default_paths, vec!["/api/status", "/api/v1/users/:id"]);

        let host_paths: Vec<_> = dispatcher
            .host_router("admin.example.com")
            .unwrap()
            .routes()
            .map(|r| r.path.clone())
            .collect();
        assert_eq!(host_paths, vec!["/", "/tools/purge"]);
    }

    #[test]
    fn test_on_add_route_sees_every_registration() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut app = AppBuilder::new();
        app.on_add_route(move |host, route| {
            sink.lock()
                .unwrap()
                .push(format!("{}|{}", host.unwrap_or("-"), route.name));
        });
        app.add_with("GET", "/a", RouteOptions::named("alpha"), noop())
            .unwrap();
        app.host("h.test", []).post("/b", noop()).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["-|alpha", "h.test|POST /b"]);
    }
}
