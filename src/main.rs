use std::{net::SocketAddr, path::Path};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context as _, eyre},
};
use http::StatusCode;
use serde_json::json;
use switchyard::{
    AppBuilder, Dispatcher, HttpError, HttpHandler, Registrar, RouteOptions,
    adapters::{logger, recover, request_id},
    config::{ServerConfigValidator, load_config, models::ServerConfig},
    handler_fn, tracing_setup,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Print the route table of the demo application
    Routes {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.toml")]
        config: String,
        /// Print routes as JSON
        #[clap(long)]
        json: bool,
    },
    /// Start the server (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config }) => validate_config_command(&config).await,
        Some(Commands::Routes { config, json }) => routes_command(&config, json).await,
        Some(Commands::Serve { config }) => serve_command(&config).await,
        None => serve_command(&args.config).await,
    }
}

/// Load the configuration file, falling back to defaults when it is absent.
async fn read_config(config_path: &str) -> Result<(ServerConfig, bool)> {
    if !Path::new(config_path).exists() {
        return Ok((ServerConfig::default(), false));
    }
    let config = load_config(config_path)
        .await
        .wrap_err_with(|| format!("Failed to load configuration from {config_path}"))?;
    ServerConfigValidator::validate(&config)
        .map_err(|e| eyre!("Invalid configuration in {config_path}: {e}"))?;
    Ok((config, true))
}

async fn serve_command(config_path: &str) -> Result<()> {
    let (config, loaded) = read_config(config_path).await?;

    tracing_setup::init_tracing(&config.logging)
        .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;
    if loaded {
        tracing::info!("Loaded configuration from {config_path}");
    } else {
        tracing::warn!("Configuration file {config_path} not found, using defaults");
    }

    let dispatcher = build_demo_app(&config)?;
    tracing::info!("Registered {} routes", dispatcher.routes().count());

    let handler = HttpHandler::new(dispatcher);
    let app = axum::Router::new().fallback_service(handler);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .wrap_err_with(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!("Listening on {}", config.listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .wrap_err("Server error")?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}

/// A small application exercising the router: static, parameter, wildcard
/// and named routes, a group with its own not-found page, and the stock
/// middleware.
fn build_demo_app(config: &ServerConfig) -> Result<Dispatcher> {
    let mut app = AppBuilder::new();
    app.with_config(&config.dispatcher)
        .pre(request_id())
        .wrap(logger())
        .wrap(recover())
        .on_add_route(|host, route| {
            tracing::debug!(
                "Route added: {} {} ({}) host={}",
                route.method,
                route.path,
                route.name,
                host.unwrap_or("*")
            );
        });

    app.get(
        "/",
        handler_fn(|c| {
            Box::pin(async move {
                c.string(StatusCode::OK, "switchyard");
                Ok(())
            })
        }),
    )?;

    app.add_with(
        "GET",
        "/users/:id",
        RouteOptions::named("user"),
        handler_fn(|c| {
            Box::pin(async move {
                let id = c.param("id").unwrap_or_default().to_string();
                c.json(StatusCode::OK, &json!({ "id": id }))
            })
        }),
    )?;

    app.get(
        "/users/new",
        handler_fn(|c| {
            Box::pin(async move {
                c.string(StatusCode::OK, "new user form");
                Ok(())
            })
        }),
    )?;

    app.get(
        "/files/*",
        handler_fn(|c| {
            Box::pin(async move {
                let path = c.param("*").unwrap_or_default().to_string();
                c.string(StatusCode::OK, path);
                Ok(())
            })
        }),
    )?;

    app.get(
        "/panic",
        handler_fn(|c| {
            Box::pin(async move {
                if c.query_param("calm").is_none() {
                    panic!("demo panic");
                }
                c.no_content(StatusCode::NO_CONTENT);
                Ok(())
            })
        }),
    )?;

    let mut api = app.group("/api", []);
    api.get(
        "/health",
        handler_fn(|c| {
            Box::pin(async move { c.json(StatusCode::OK, &json!({ "status": "ok" })) })
        }),
    )?;
    api.route_not_found(
        "/*",
        handler_fn(|_| {
            Box::pin(async {
                Err(HttpError::with_message(StatusCode::NOT_FOUND, "no such API endpoint").into())
            })
        }),
    )?;

    Ok(app.build())
}

/// Print the demo application's route table
async fn routes_command(config_path: &str, as_json: bool) -> Result<()> {
    let (config, _) = read_config(config_path).await?;
    let dispatcher = build_demo_app(&config)?;

    if as_json {
        let routes: Vec<_> = dispatcher.routes().map(|route| route.as_ref()).collect();
        println!("{}", serde_json::to_string_pretty(&routes)?);
        return Ok(());
    }

    println!("📋 Routes:");
    for route in dispatcher.routes() {
        println!("   • {:<8} {:<20} {}", route.method.as_str(), route.path, route.name);
    }
    Ok(())
}

/// Validate configuration file
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e}");
            std::process::exit(1);
        }
    };

    match ServerConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            println!("   • Debug Errors: {}", config.dispatcher.debug);
            println!("   • Max Idle Contexts: {}", config.dispatcher.max_idle_contexts);
            println!(
                "   • Log Level: {} ({})",
                config.logging.level,
                if config.logging.json { "json" } else { "pretty" }
            );
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Verify listen address format (e.g., '127.0.0.1:3000')");
            println!("   • Use a valid log filter (e.g., 'info' or 'switchyard=debug')");
            println!("   • Keep dispatcher.max_idle_contexts above zero");
            std::process::exit(1);
        }
    }
}
