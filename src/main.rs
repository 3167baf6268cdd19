//! Route engine server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ dispatch::dispatcher
//!                                        │
//!                                        ├─ routing::redirect   (rewrite + 3xx)
//!                                        ├─ middleware          (framework, autoload, auth gates)
//!                                        ├─ routing::table      (declared routes, pattern match)
//!                                        └─ dispatch::handler   (convention fallback)
//!     Client Response
//!     ◀────────────── Reply
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use route_engine::config::{load_config, EngineConfig};
use route_engine::http::HttpServer;
use route_engine::lifecycle::{demo_application, Shutdown};
use route_engine::observability::logging;

#[derive(Parser)]
#[command(name = "route-engine")]
#[command(about = "Pattern-matching request router with guards and convention dispatch", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration, print the route table and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => EngineConfig::default(),
    };

    if let Err(e) = logging::init(&config.observability) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("route-engine v{} starting", env!("CARGO_PKG_VERSION"));

    let bind_address = config.listener.bind_address.clone();
    let dispatcher = Arc::new(demo_application(config).build()?);

    if cli.check {
        print_routes(&dispatcher);
        return Ok(());
    }

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(shutdown.clone().trigger_on_ctrl_c());

    HttpServer::new(dispatcher).run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn print_routes(dispatcher: &route_engine::Dispatcher) {
    let routes = dispatcher.routes();
    println!("Configuration OK");
    println!();
    println!("{:<8} {:<28} {:<28} GUARDS", "METHOD", "PATTERN", "HANDLER");
    for entry in routes.auth_entries().iter().chain(routes.entries()) {
        println!(
            "{:<8} {:<28} {:<28} {}",
            entry.method().as_str(),
            format!("/{}", entry.pattern().normalized()),
            entry.handler().describe(),
            entry.guard_names().join(", ")
        );
    }
    for rule in routes.redirects() {
        println!(
            "{:<8} {:<28} {:<28}",
            rule.code,
            format!("/{}", rule.from.trim_matches('/')),
            format!("→ /{}", rule.to.trim_matches('/'))
        );
    }
}
