//! Configuration management.
//!
//! Loads configuration from environment variables using dotenvy.
//! Cookie settings are validated before the config is handed out in an Arc.

mod error;
mod settings;

pub use error::{Result, TrackingError};
pub use settings::{Config, CookieSettings, SameSitePolicy};
