//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use route_engine::config::EngineConfig;
use route_engine::dispatch::{Controller, Dispatcher, Reply};
use route_engine::lifecycle::{Application, Shutdown};

/// Application with a home controller and a not-found controller.
#[allow(dead_code)]
pub fn application(config: EngineConfig) -> Application {
    let mut app = Application::new(config);
    app.controllers()
        .register(Controller::new("HomeController").action("default", 0, |_, _| Reply::text("home")))
        .register(
            Controller::new("NotFoundController")
                .action("default", 0, |ctx, _| Reply::text(format!("missing: {}", ctx.path))),
        );
    app
}

/// Serve `dispatcher` on an ephemeral loopback port.
#[allow(dead_code)]
pub async fn start_server(dispatcher: Dispatcher) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let server = route_engine::http::HttpServer::new(Arc::new(dispatcher));

    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    (addr, shutdown)
}

/// HTTP client that neither pools connections nor follows redirects.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}
