pub mod error_handler;
pub mod http_server;

pub use error_handler::ErrorHandler;
pub use http_server::RequestHandler;
