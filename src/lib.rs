//! Switchyard - an HTTP request router and dispatch pipeline.
//!
//! Switchyard maps `(method, path, host)` to a handler through a radix trie with
//! strict static > parameter > wildcard priority, backtracking when a greedy
//! static match dead-ends. Matched handlers run inside an onion-ordered
//! middleware chain on a pooled, per-request [`Context`], and every error a
//! chain returns is rendered by a single centralized error handler.
//!
//! # Features
//! - `:name` single-segment captures and a terminal `*` catch-all
//! - `405 Method Not Allowed` with an `Allow` header, automatic `OPTIONS`
//! - Custom not-found pseudo-routes per path prefix
//! - Per-host routers with fallback to the default router
//! - Route groups with inherited prefix, host and middleware
//! - Named routes and reverse URL generation
//! - Pre-routing and post-routing middleware
//! - Stock logger, panic recovery and request id middleware
//! - A `tower::Service` adapter that mounts into `axum`
//!
//! # Quick Example
//! ```no_run
//! use switchyard::{AppBuilder, HttpHandler, Registrar, handler_fn, http::StatusCode};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let mut app = AppBuilder::new();
//! app.wrap(switchyard::adapters::logger());
//! app.get(
//!     "/users/:id",
//!     handler_fn(|c| {
//!         Box::pin(async move {
//!             let id = c.param("id").unwrap_or_default().to_string();
//!             c.string(StatusCode::OK, format!("user {id}"));
//!             Ok(())
//!         })
//!     }),
//! )?;
//!
//! let service = axum::Router::new().fallback_service(HttpHandler::new(app.build()));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, service).await?;
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! Routing, dispatch and the context pool live in `core`. The seams a host
//! application can replace (error rendering, request serving) are traits in
//! `ports`, with stock implementations in `adapters`.
//!
//! # Concurrency
//! A [`Dispatcher`] is immutable once built. Lookups take no locks; the only
//! shared mutable state on the hot path is the context pool. Reconfiguring
//! means building a new dispatcher and swapping it into [`HttpHandler`].
//!
//! # Error Handling
//! Handlers and middleware return `eyre::Result<()>`. Attach an [`HttpError`]
//! anywhere in the report's chain to choose the response status.
pub mod config;
pub mod ports;
pub mod tracing_setup;

pub mod adapters;
pub mod core;

pub use http;

pub use crate::{
    adapters::{DefaultErrorHandler, HttpHandler},
    core::{
        AppBuilder, Context, Dispatcher, Group, Handler, HttpError, Middleware, Registrar,
        ReverseError, RouteError, RouteMethod, RouteOptions, apply_middleware, handler_fn,
        middleware_fn,
    },
    ports::{ErrorHandler, RequestHandler},
};
