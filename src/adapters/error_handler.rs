//! JSON rendering of handler errors.
use http::{Method, StatusCode};

use crate::{
    core::{context::Context, error::HttpError},
    ports::error_handler::ErrorHandler,
};

/// Renders errors as `{"message": ...}` with the error's status code.
///
/// - The first [`HttpError`] in the report's chain decides status and message;
///   an `HttpError` nested as its internal cause takes precedence.
/// - Anything else becomes `500 Internal Server Error`.
/// - In debug mode the full error text is added under `"error"`.
/// - `HEAD` requests get the status line only.
/// - A committed response is left untouched and the error is only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn handle_error(&self, err: eyre::Report, c: &mut Context) {
        if c.response().committed() {
            tracing::debug!(
                "Dropping error for {} {}, response already committed: {:#}",
                c.method(),
                c.request_path(),
                err
            );
            return;
        }

        let (code, message) = classify(&err);
        if code.is_server_error() {
            tracing::error!("{} {} failed: {:#}", c.method(), c.request_path(), err);
        }

        if *c.method() == Method::HEAD {
            c.no_content(code);
            return;
        }

        let body = if c.is_debug() {
            serde_json::json!({ "message": message, "error": format!("{err:#}") })
        } else {
            serde_json::json!({ "message": message })
        };
        if let Err(e) = c.json(code, &body) {
            tracing::error!("Failed to render error response: {}", e);
        }
    }
}

/// Status code and public message for `err`.
pub fn classify(err: &eyre::Report) -> (StatusCode, String) {
    match err
        .chain()
        .find_map(|cause| cause.downcast_ref::<HttpError>())
    {
        Some(http) => {
            let http = http.resolve();
            (http.code, http.message.clone())
        }
        None => {
            let code = StatusCode::INTERNAL_SERVER_ERROR;
            (code, code.canonical_reason().unwrap_or_default().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use eyre::WrapErr;
    use http::Request;

    use super::*;

    fn context(method: Method) -> Context {
        let mut ctx = Context::detached();
        ctx.reset(
            Request::builder()
                .method(method)
                .uri("/x")
                .body(Body::empty())
                .unwrap(),
        );
        ctx
    }

    async fn body_json(ctx: &mut Context) -> serde_json::Value {
        let response = ctx.take_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_structured_error_uses_code_and_message() {
        let mut ctx = context(Method::GET);
        let err = eyre::Report::new(HttpError::with_message(StatusCode::CONFLICT, "taken"));
        DefaultErrorHandler.handle_error(err, &mut ctx);

        assert_eq!(ctx.response().status(), StatusCode::CONFLICT);
        assert_eq!(body_json(&mut ctx).await, serde_json::json!({"message": "taken"}));
    }

    #[tokio::test]
    async fn test_wrapped_http_error_is_found_in_chain() {
        let mut ctx = context(Method::GET);
        let err = Err::<(), _>(HttpError::forbidden())
            .wrap_err("checking permissions")
            .unwrap_err();
        DefaultErrorHandler.handle_error(err, &mut ctx);
        assert_eq!(ctx.response().status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_unstructured_error_hides_detail() {
        let mut ctx = context(Method::GET);
        DefaultErrorHandler.handle_error(eyre::eyre!("db password is hunter2"), &mut ctx);

        assert_eq!(ctx.response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(&mut ctx).await;
        assert_eq!(body, serde_json::json!({"message": "Internal Server Error"}));
    }

    #[tokio::test]
    async fn test_head_request_gets_status_only() {
        let mut ctx = context(Method::HEAD);
        DefaultErrorHandler.handle_error(HttpError::not_found().into(), &mut ctx);
        assert_eq!(ctx.response().status(), StatusCode::NOT_FOUND);
        assert_eq!(ctx.response().size(), 0);
    }

    #[test]
    fn test_committed_response_is_not_rewritten() {
        let mut ctx = context(Method::GET);
        ctx.string(StatusCode::OK, "partial");
        DefaultErrorHandler.handle_error(eyre::eyre!("late failure"), &mut ctx);
        assert_eq!(ctx.response().status(), StatusCode::OK);
        assert_eq!(ctx.response().size(), "partial".len());
    }
}
