pub mod app;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod method;
pub mod params;
pub mod pool;
pub mod route;
pub mod router;
pub mod tree;

pub use app::{AppBuilder, Group, Registrar, RouteOptions};
pub use context::{Context, ResponseWriter};
pub use dispatcher::Dispatcher;
pub use error::{HttpError, ReverseError, RouteError};
pub use handler::{Handler, Middleware, apply_middleware, handler_fn, middleware_fn};
pub use method::{MethodSet, RouteMethod};
pub use params::PathParams;
pub use route::Route;
pub use router::{RouteMatch, Router};
