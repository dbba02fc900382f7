//! Test utilities and shared configuration.
//!
//! This module provides common helpers for unit and integration tests,
//! reducing duplication across the codebase.

#[cfg(any(test, feature = "testing"))]
use crate::config::{Config, CookieSettings};
#[cfg(any(test, feature = "testing"))]
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
#[cfg(any(test, feature = "testing"))]
use std::sync::Arc;

/// Creates a standard configuration for testing purposes.
///
/// This configuration has:
/// - Proxy on 127.0.0.1:8080, backend on 127.0.0.1:9000
/// - Default cookie settings (`ttc-cid`/`ttc-sid`, 32 characters, one year)
#[cfg(any(test, feature = "testing"))]
#[must_use]
pub fn create_test_config() -> Arc<Config> {
    Arc::new(Config {
        listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
        backend_url: "http://127.0.0.1:9000".to_string(),
        log_format: "pretty".to_string(),
        cookies: CookieSettings::default(),
    })
}
