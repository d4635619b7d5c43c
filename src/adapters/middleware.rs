//! Stock middleware for the dispatch pipeline.
//!
//! - [`logger`]: one structured access-log event per request
//! - [`recover`]: turns a panicking handler into a `500` response
//! - [`request_id`]: propagates or generates `X-Request-Id` and opens a
//!   request span
//!
//! Each comes with a `*_with_config` variant taking a [`Skipper`] and the
//! knobs specific to it.
use std::{
    any::Any,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::Instant,
};

use futures_util::FutureExt;
use http::{HeaderValue, header};
use thiserror::Error;
use tracing::Instrument;

use crate::{
    core::{
        context::{Context, HEADER_X_REQUEST_ID},
        error::HttpError,
        handler::{Middleware, handler_fn, middleware_fn},
    },
    tracing_setup::create_request_span,
};

/// Store key under which [`request_id`] records the request id.
pub const REQUEST_ID_KEY: &str = "request_id";

/// Returns `true` when a middleware should pass the request straight through.
pub type Skipper = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

fn skip(skipper: &Option<Skipper>, c: &Context) -> bool {
    skipper.as_ref().is_some_and(|skipper| skipper(c))
}

/// Access log configuration.
#[derive(Clone, Default)]
pub struct LoggerConfig {
    pub skipper: Option<Skipper>,
}

/// Access log with default settings.
pub fn logger() -> Middleware {
    logger_with_config(LoggerConfig::default())
}

/// Log one event per request after the inner chain has finished.
///
/// An error returned by the chain is rendered through [`Context::error`]
/// first so the logged status is the one the client receives; the error is
/// consumed and not handed back to the dispatcher.
pub fn logger_with_config(config: LoggerConfig) -> Middleware {
    middleware_fn(move |next| {
        let skipper = config.skipper.clone();
        handler_fn(move |c| {
            let next = next.clone();
            let skipper = skipper.clone();
            Box::pin(async move {
                if skip(&skipper, c) {
                    return next(c).await;
                }

                let start = Instant::now();
                let error = match next(c).await {
                    Ok(()) => None,
                    Err(err) => {
                        let text = format!("{err:#}");
                        c.error(err);
                        Some(text)
                    }
                };
                let latency = start.elapsed();

                let request = c.request();
                let id = request
                    .headers()
                    .get(HEADER_X_REQUEST_ID)
                    .or_else(|| c.response().headers().get(HEADER_X_REQUEST_ID))
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default();
                let bytes_in = request
                    .headers()
                    .get(header::CONTENT_LENGTH)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("0");
                let user_agent = request
                    .headers()
                    .get(header::USER_AGENT)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default();
                let host = request
                    .headers()
                    .get(header::HOST)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default();

                tracing::info!(
                    id = id,
                    remote_ip = %c.real_ip().unwrap_or_default(),
                    host = host,
                    method = %request.method(),
                    uri = %request.uri(),
                    route = c.path(),
                    user_agent = user_agent,
                    status = c.response().status().as_u16(),
                    error = error.as_deref().unwrap_or_default(),
                    latency_us = latency.as_micros() as u64,
                    latency_human = ?latency,
                    bytes_in = bytes_in,
                    bytes_out = c.response().size(),
                    "request completed"
                );
                Ok(())
            })
        })
    })
}

/// A panic caught by [`recover`].
#[derive(Error, Debug)]
#[error("{message}")]
pub struct PanicError {
    pub message: String,
}

/// Panic recovery configuration.
#[derive(Clone, Default)]
pub struct RecoverConfig {
    pub skipper: Option<Skipper>,
    /// Return the converted error to the caller instead of rendering it.
    pub disable_error_handler: bool,
}

/// Panic recovery with default settings.
pub fn recover() -> Middleware {
    recover_with_config(RecoverConfig::default())
}

/// Catch panics of the inner chain and convert them into a `500`
/// [`HttpError`] whose internal cause is a [`PanicError`].
pub fn recover_with_config(config: RecoverConfig) -> Middleware {
    middleware_fn(move |next| {
        let config = config.clone();
        handler_fn(move |c| {
            let next = next.clone();
            let config = config.clone();
            Box::pin(async move {
                if skip(&config.skipper, c) {
                    return next(c).await;
                }

                let payload = match AssertUnwindSafe(next(c)).catch_unwind().await {
                    Ok(result) => return result,
                    Err(payload) => payload,
                };

                let message = panic_message(&*payload);
                tracing::error!(
                    "[PANIC RECOVER] {} {}: {}",
                    c.method(),
                    c.request_path(),
                    message
                );
                let err: eyre::Report = HttpError::internal()
                    .with_internal(PanicError { message })
                    .into();
                if config.disable_error_handler {
                    return Err(err);
                }
                c.error(err);
                Ok(())
            })
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Request id configuration.
#[derive(Clone)]
pub struct RequestIdConfig {
    pub skipper: Option<Skipper>,
    pub generator: Arc<dyn Fn() -> String + Send + Sync>,
}

impl Default for RequestIdConfig {
    fn default() -> Self {
        Self {
            skipper: None,
            generator: Arc::new(|| uuid::Uuid::new_v4().to_string()),
        }
    }
}

/// Request id with UUID v4 generation.
pub fn request_id() -> Middleware {
    request_id_with_config(RequestIdConfig::default())
}

/// Reuse the inbound `X-Request-Id` or generate one, echo it on the
/// response, store it under [`REQUEST_ID_KEY`] and run the rest of the chain
/// inside a request span.
pub fn request_id_with_config(config: RequestIdConfig) -> Middleware {
    middleware_fn(move |next| {
        let config = config.clone();
        handler_fn(move |c| {
            let next = next.clone();
            let config = config.clone();
            Box::pin(async move {
                if skip(&config.skipper, c) {
                    return next(c).await;
                }

                let id = c
                    .request()
                    .headers()
                    .get(HEADER_X_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| (config.generator)());

                match HeaderValue::from_str(&id) {
                    Ok(value) => {
                        c.response_mut()
                            .headers_mut()
                            .insert(HEADER_X_REQUEST_ID, value);
                    }
                    Err(e) => tracing::warn!("Invalid request id '{}': {}", id, e),
                }

                let span = create_request_span(c.method().as_str(), c.request_path(), &id);
                c.set(REQUEST_ID_KEY, id);

                let start = Instant::now();
                let result = next(c).instrument(span.clone()).await;
                span.record("http.status_code", c.response().status().as_u16());
                span.record("duration_ms", start.elapsed().as_millis() as u64);
                result
            })
        })
    })
}
