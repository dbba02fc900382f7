//! `tracking-cookie` - Reverse proxy assigning client and session tracking cookies.
//!
//! SPDX-License-Identifier: AGPL-3.0-only
//!
//! Initializes logging, loads configuration, and launches the proxy service.

use tracking_cookie::{Config, TrackingProxy};

use pingora::proxy::http_proxy_service;
use pingora::server::Server;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    dotenvy::dotenv().ok();

    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(non_blocking);

    if log_format.eq_ignore_ascii_case("pretty") {
        subscriber.init();
    } else {
        subscriber.json().init();
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            drop(guard);
            std::process::exit(1);
        }
    };

    let proxy = match TrackingProxy::new(config.clone()) {
        Ok(proxy) => proxy,
        Err(e) => {
            error!(error = %e, "Failed to build proxy");
            drop(guard);
            std::process::exit(1);
        }
    };

    info!(
        listen_addr = %config.listen_addr,
        backend_url = %config.backend_url,
        client_cookie = %config.cookies.client_cookie_full_name(),
        session_cookie = %config.cookies.session_cookie_full_name(),
        log_format = %config.log_format,
        "Server initialized"
    );

    let mut server = Server::new(None).expect("Failed to create Pingora server");
    server.bootstrap();

    let mut proxy_service = http_proxy_service(&server.configuration, proxy);
    proxy_service.add_tcp(&config.listen_addr.to_string());
    server.add_service(proxy_service);

    server.run_forever();
}
