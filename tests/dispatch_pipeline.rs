// Integration tests for the request pipeline: middleware, pooling and errors
#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::body::Body;
    use switchyard::{
        AppBuilder, Context, Dispatcher, HttpError, HttpHandler, Middleware, Registrar,
        RouteOptions,
        adapters::recover,
        handler_fn,
        http::{Method, Request, Response, StatusCode, header},
        middleware_fn,
    };
    use tower::ServiceExt; // for oneshot

    type Trace = Arc<Mutex<Vec<String>>>;

    fn traced(name: &'static str, trace: Trace) -> Middleware {
        middleware_fn(move |next| {
            let trace = trace.clone();
            handler_fn(move |c| {
                let next = next.clone();
                let trace = trace.clone();
                Box::pin(async move {
                    trace.lock().unwrap().push(format!("{name}-before"));
                    let result = next(c).await;
                    trace.lock().unwrap().push(format!("{name}-after"));
                    result
                })
            })
        })
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response<Body>) -> serde_json::Value {
        serde_json::from_str(&body_string(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_middleware_onion_order() {
        let trace: Trace = Arc::default();
        let mut app = AppBuilder::new();
        app.pre(traced("pre", trace.clone()))
            .wrap(traced("A", trace.clone()))
            .wrap(traced("B", trace.clone()));

        let handler_trace = trace.clone();
        let mut group = app.group("/g", [traced("group", trace.clone())]);
        group
            .add_with(
                "GET",
                "/h",
                RouteOptions::default().with_middleware(traced("route", trace.clone())),
                handler_fn(move |_| {
                    let trace = handler_trace.clone();
                    Box::pin(async move {
                        trace.lock().unwrap().push("H".to_string());
                        Ok(())
                    })
                }),
            )
            .unwrap();
        let dispatcher = app.build();

        dispatcher.serve(request(Method::GET, "/g/h")).await;

        assert_eq!(
            *trace.lock().unwrap(),
            [
                "pre-before",
                "A-before",
                "B-before",
                "group-before",
                "route-before",
                "H",
                "route-after",
                "group-after",
                "B-after",
                "A-after",
                "pre-after",
            ]
        );
    }

    #[tokio::test]
    async fn test_pooled_context_does_not_leak_between_requests() {
        let mut app = AppBuilder::new();
        app.max_idle_contexts(1);
        app.get(
            "/items/:id",
            handler_fn(|c| {
                Box::pin(async move {
                    let seen = c.get::<String>("previous").cloned().unwrap_or_default();
                    let id = c.param("id").unwrap_or_default().to_string();
                    c.set("previous", id.clone());
                    c.string(StatusCode::OK, format!("{id}|{seen}"));
                    Ok(())
                })
            }),
        )
        .unwrap();
        app.get(
            "/plain",
            handler_fn(|c| {
                Box::pin(async move {
                    let report = format!("{}|{}", c.param_values().len(), c.contains("previous"));
                    c.string(StatusCode::OK, report);
                    Ok(())
                })
            }),
        )
        .unwrap();
        let dispatcher = app.build();

        let first = dispatcher.serve(request(Method::GET, "/items/1")).await;
        assert_eq!(body_string(first).await, "1|");
        let second = dispatcher.serve(request(Method::GET, "/items/2")).await;
        assert_eq!(body_string(second).await, "2|");
        let third = dispatcher.serve(request(Method::GET, "/plain")).await;
        assert_eq!(body_string(third).await, "0|false");
        assert_eq!(dispatcher.idle_contexts(), 1);
    }

    #[tokio::test]
    async fn test_committed_response_is_not_rewritten() {
        let mut app = AppBuilder::new();
        app.get(
            "/",
            handler_fn(|c| {
                Box::pin(async move {
                    c.string(StatusCode::ACCEPTED, "partial");
                    Err(HttpError::internal().into())
                })
            }),
        )
        .unwrap();
        let dispatcher = app.build();

        let response = dispatcher.serve(request(Method::GET, "/")).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_string(response).await, "partial");
    }

    #[tokio::test]
    async fn test_custom_error_handler_respects_commit() {
        let calls = Arc::new(Mutex::new(0usize));
        let counter = calls.clone();

        let mut app = AppBuilder::new();
        app.error_handler(move |_: eyre::Report, c: &mut Context| {
            *counter.lock().unwrap() += 1;
            let _ = c.json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &serde_json::json!({ "message": "late" }),
            );
        });
        app.get(
            "/",
            handler_fn(|c| {
                Box::pin(async move {
                    c.string(StatusCode::OK, "partial");
                    Err(eyre::eyre!("failed after writing"))
                })
            }),
        )
        .unwrap();
        let dispatcher = app.build();

        let response = dispatcher.serve(request(Method::GET, "/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=UTF-8"
        );
        assert_eq!(body_string(response).await, "partial");
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_default_not_found_and_custom_not_found() {
        let mut app = AppBuilder::new();
        app.get("/", handler_fn(|_| Box::pin(async { Ok(()) })))
            .unwrap();
        app.route_not_found(
            "/docs/*",
            handler_fn(|c| {
                Box::pin(async move {
                    c.string(StatusCode::NOT_FOUND, "no such page in docs");
                    Ok(())
                })
            }),
        )
        .unwrap();
        let dispatcher = app.build();

        let response = dispatcher.serve(request(Method::GET, "/missing")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "message": "Not Found" })
        );

        let response = dispatcher
            .serve(request(Method::POST, "/docs/intro/setup"))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "no such page in docs");
    }

    #[tokio::test]
    async fn test_method_not_allowed_and_options() {
        let mut app = AppBuilder::new();
        app.get("/items", handler_fn(|_| Box::pin(async { Ok(()) })))
            .unwrap();
        let dispatcher = app.build();

        let response = dispatcher.serve(request(Method::POST, "/items")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET");

        let response = dispatcher.serve(request(Method::OPTIONS, "/items")).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[header::ALLOW], "GET");

        let response = dispatcher.serve(request(Method::OPTIONS, "/other")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_error_rendering_modes() {
        fn failing_app(debug: bool) -> Dispatcher {
            let mut app = AppBuilder::new();
            app.debug(debug);
            app.get(
                "/boom",
                handler_fn(|_| Box::pin(async { Err(eyre::eyre!("database unreachable")) })),
            )
            .unwrap();
            app.build()
        }

        let response = failing_app(false)
            .serve(request(Method::GET, "/boom"))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "message": "Internal Server Error" })
        );

        let response = failing_app(true)
            .serve(request(Method::GET, "/boom"))
            .await;
        let body = body_json(response).await;
        assert_eq!(body["message"], "Internal Server Error");
        assert!(body["error"].as_str().unwrap().contains("database unreachable"));

        let response = failing_app(false)
            .serve(request(Method::HEAD, "/missing"))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_custom_error_handler_runs_once() {
        let calls = Arc::new(Mutex::new(0usize));
        let counter = calls.clone();

        let mut app = AppBuilder::new();
        app.error_handler(move |err: eyre::Report, c: &mut Context| {
            *counter.lock().unwrap() += 1;
            c.string(StatusCode::IM_A_TEAPOT, format!("custom: {err}"));
        });
        app.get(
            "/",
            handler_fn(|_| Box::pin(async { Err(eyre::eyre!("nope")) })),
        )
        .unwrap();
        let dispatcher = app.build();

        let response = dispatcher.serve(request(Method::GET, "/")).await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(body_string(response).await, "custom: nope");
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_pre_middleware_rewrites_before_routing() {
        let mut app = AppBuilder::new();
        app.pre(middleware_fn(|next| {
            handler_fn(move |c| {
                let next = next.clone();
                Box::pin(async move {
                    if c.request_path() == "/legacy" {
                        *c.request_mut().uri_mut() = "/current".parse().unwrap();
                    }
                    next(c).await
                })
            })
        }));
        app.get(
            "/current",
            handler_fn(|c| {
                Box::pin(async move {
                    let path = c.path().to_string();
                    c.string(StatusCode::OK, path);
                    Ok(())
                })
            }),
        )
        .unwrap();
        let dispatcher = app.build();

        let response = dispatcher.serve(request(Method::GET, "/legacy")).await;
        assert_eq!(body_string(response).await, "/current");
    }

    #[tokio::test]
    async fn test_recovered_panic_through_service() {
        let mut app = AppBuilder::new();
        app.wrap(recover());
        app.get(
            "/panic",
            handler_fn(|c| {
                Box::pin(async move {
                    if c.request_path() == "/panic" {
                        panic!("handler exploded");
                    }
                    Ok(())
                })
            }),
        )
        .unwrap();
        let handler = HttpHandler::new(app.build());

        let response = handler
            .clone()
            .oneshot(request(Method::GET, "/panic"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(handler.current().idle_contexts(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_requests_see_their_own_params() {
        let mut app = AppBuilder::new();
        app.get(
            "/echo/:value",
            handler_fn(|c| {
                Box::pin(async move {
                    tokio::task::yield_now().await;
                    let value = c.param("value").unwrap_or_default().to_string();
                    c.string(StatusCode::OK, value);
                    Ok(())
                })
            }),
        )
        .unwrap();
        let dispatcher = Arc::new(app.build());

        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    let response = dispatcher
                        .serve(request(Method::GET, &format!("/echo/{i}")))
                        .await;
                    (i, body_string(response).await)
                })
            })
            .collect();

        for task in tasks {
            let (i, body) = task.await.unwrap();
            assert_eq!(body, i.to_string());
        }
    }
}
