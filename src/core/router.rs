//! One routing table: a radix trie plus the registry of its routes.
//!
//! Routers are filled during setup and only read afterwards. Lookups take
//! `&self` and never lock; registering while requests are being served is
//! ruled out by ownership, since a built [`Dispatcher`](crate::core::Dispatcher)
//! exposes no mutable access to its routers.
use std::sync::Arc;

use crate::core::{
    error::{ReverseError, RouteResult},
    handler::Handler,
    method::{MethodSet, RouteMethod},
    params::PathParams,
    route::{Route, RouteRegistry, normalize_path, parse_pattern},
    tree::{Endpoint, Node},
};

/// Outcome of [`Router::find`].
#[derive(Debug)]
pub enum RouteMatch<'r> {
    /// A handler for the method, or a not-found pseudo-route, matched.
    Found(&'r Endpoint),
    /// The path exists but only under other methods.
    MethodNotAllowed(MethodSet),
    NotFound,
}

#[derive(Debug, Default)]
pub struct Router {
    host: Option<String>,
    root: Node,
    registry: RouteRegistry,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router serving one virtual host.
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::default()
        }
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Register `handler` for `method` on `path`.
    ///
    /// Registering the same method and pattern again replaces the earlier
    /// handler; the replacement is logged and takes over the old route's
    /// position in [`routes`](Self::routes).
    pub fn add(
        &mut self,
        method: RouteMethod,
        path: &str,
        name: Option<String>,
        handler: Handler,
    ) -> RouteResult<Arc<Route>> {
        let path = normalize_path(path);
        let segments = parse_pattern(&path)?;
        let route = Arc::new(Route::new(method, path, name, segments));

        let node = self.root.insert(route.segments());
        let replaced = node.bind(
            method,
            Endpoint {
                route: route.clone(),
                handler,
            },
        );

        if let Some(old) = &replaced {
            tracing::warn!(
                "Replacing handler for {} {} on host '{}' (previous route '{}')",
                method,
                route.path,
                self.host.as_deref().unwrap_or("*"),
                old.route.name
            );
        } else {
            tracing::debug!("Registered route {} {}", method, route.path);
        }
        self.registry
            .record(route.clone(), replaced.as_ref().map(|old| &old.route));

        Ok(route)
    }

    /// Resolve `method` and `path`, writing captured values into `params`.
    pub fn find<'r>(
        &'r self,
        method: &http::Method,
        path: &str,
        params: &mut PathParams,
    ) -> RouteMatch<'r> {
        params.clear();
        let mut fallback = None;
        let found = self.root.search(
            path.as_bytes(),
            0,
            RouteMethod::from_http(method),
            params.spans_mut(),
            &mut fallback,
        );

        match (found, fallback) {
            (Some(endpoint), _) => {
                params.commit(path);
                RouteMatch::Found(endpoint)
            }
            (None, Some(node)) => {
                params.clear();
                RouteMatch::MethodNotAllowed(node.allowed())
            }
            (None, None) => {
                params.clear();
                RouteMatch::NotFound
            }
        }
    }

    /// Build a URL for the route registered under `name`.
    pub fn reverse<S: AsRef<str>>(&self, name: &str, values: &[S]) -> Result<String, ReverseError> {
        self.registry
            .by_name(name)
            .ok_or_else(|| ReverseError::UnknownRoute {
                name: name.to_string(),
            })?
            .reverse(values)
    }

    /// Registered routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.registry.iter()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Largest number of captures any route of this router declares.
    pub fn max_params(&self) -> usize {
        self.registry.max_params()
    }

    /// Every endpoint held by the trie.
    pub fn endpoints(&self) -> Vec<&Endpoint> {
        self.root.endpoints()
    }
}
