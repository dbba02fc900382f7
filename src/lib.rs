//! Library definitions.
//!
//! Exports the configuration, the tracking cookie middleware and the
//! reverse proxy that applies it.

pub mod config;
pub mod core;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;
pub use config::{Config, CookieSettings, Result, SameSitePolicy, TrackingError};
pub use crate::core::middleware::{
    Assignment, TrackingCookieLayer, TrackingCookieService, TrackingCookies, TrackingIds,
    generate_token,
};
pub use crate::core::proxy::TrackingProxy;
