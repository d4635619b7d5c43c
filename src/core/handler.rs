//! Handler and middleware function types and their composition.
//!
//! A [`Handler`] borrows the pooled [`Context`] mutably for the duration of
//! its future. A [`Middleware`] is a pure function from the next handler to a
//! wrapping handler; [`apply_middleware`] folds a list of them right to left
//! so the first one registered observes the request first and the response
//! last.
use std::sync::Arc;

use futures_util::future::BoxFuture;
use http::{HeaderValue, StatusCode, header};

use crate::core::{context::Context, error::HttpError};

/// Future returned by a handler invocation.
pub type HandlerFuture<'a> = BoxFuture<'a, eyre::Result<()>>;

/// Request handler. Cheap to clone.
pub type Handler = Arc<dyn for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync>;

/// Wraps a handler into another handler.
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Build a [`Handler`] from a closure.
///
/// ```
/// use switchyard::{handler_fn, http::StatusCode};
///
/// let hello = handler_fn(|c| Box::pin(async move {
///     c.string(StatusCode::OK, "hello");
///     Ok(())
/// }));
/// # let _ = hello;
/// ```
pub fn handler_fn<F>(f: F) -> Handler
where
    F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Build a [`Middleware`] from a closure taking the next handler.
pub fn middleware_fn<F>(f: F) -> Middleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Compose `middleware` around `handler`; `middleware[0]` ends up outermost.
pub fn apply_middleware(handler: Handler, middleware: &[Middleware]) -> Handler {
    middleware
        .iter()
        .rev()
        .fold(handler, |next, wrap| wrap(next))
}

/// Terminal handler for requests no route matched.
pub fn not_found_handler() -> Handler {
    handler_fn(|_| Box::pin(async { Err(HttpError::not_found().into()) }))
}

/// Terminal handler for a path that exists under other methods. Sets the
/// `Allow` header from the router's outcome before failing with 405.
pub fn method_not_allowed_handler() -> Handler {
    handler_fn(|c| {
        Box::pin(async move {
            set_allow_header(c);
            Err(HttpError::method_not_allowed().into())
        })
    })
}

/// Answers `OPTIONS` for a path that has handlers for other methods.
pub fn options_handler() -> Handler {
    handler_fn(|c| {
        Box::pin(async move {
            set_allow_header(c);
            c.no_content(StatusCode::NO_CONTENT);
            Ok(())
        })
    })
}

fn set_allow_header(c: &mut Context) {
    let allowed = c.allowed_methods();
    if allowed.is_empty() {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&allowed.to_header_value()) {
        c.response_mut().headers_mut().insert(header::ALLOW, value);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn tracing_middleware(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Middleware {
        middleware_fn(move |next| {
            let log = log.clone();
            handler_fn(move |c| {
                let next = next.clone();
                let log = log.clone();
                Box::pin(async move {
                    log.lock().unwrap().push(format!("{name}-before"));
                    let result = next(c).await;
                    log.lock().unwrap().push(format!("{name}-after"));
                    result
                })
            })
        })
    }

    #[tokio::test]
    async fn test_onion_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner_log = log.clone();
        let handler = handler_fn(move |_| {
            let log = inner_log.clone();
            Box::pin(async move {
                log.lock().unwrap().push("H".to_string());
                Ok(())
            })
        });

        let chain = apply_middleware(
            handler,
            &[
                tracing_middleware("A", log.clone()),
                tracing_middleware("B", log.clone()),
            ],
        );

        let mut ctx = Context::detached();
        chain(&mut ctx).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["A-before", "B-before", "H", "B-after", "A-after"]
        );
    }

    #[tokio::test]
    async fn test_composition_is_repeatable() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let middleware = [tracing_middleware("A", log.clone())];
        let handler = handler_fn(|_| Box::pin(async { Ok(()) }));

        let mut ctx = Context::detached();
        apply_middleware(handler.clone(), &middleware)(&mut ctx)
            .await
            .unwrap();
        apply_middleware(handler, &middleware)(&mut ctx)
            .await
            .unwrap();

        assert_eq!(log.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_not_found_handler_returns_structured_error() {
        let mut ctx = Context::detached();
        let err = not_found_handler()(&mut ctx).await.unwrap_err();
        let http = err.downcast_ref::<HttpError>().unwrap();
        assert_eq!(http.code, StatusCode::NOT_FOUND);
    }
}
