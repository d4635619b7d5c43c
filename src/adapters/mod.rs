pub mod error_handler;
pub mod http_handler;
pub mod middleware;

/// Re-export commonly used types from adapters
pub use error_handler::DefaultErrorHandler;
pub use http_handler::HttpHandler;
pub use middleware::*;
