//! Configuration settings.
//!
//! Defines the main `Config` struct, the cookie attribute settings and
//! environment variable loading logic.

use super::error::{Result, TrackingError};
use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

const DEFAULT_COOKIE_NAME_PREFIX: &str = "ttc";
const DEFAULT_CLIENT_COOKIE_NAME: &str = "cid";
const DEFAULT_SESSION_COOKIE_NAME: &str = "sid";
const DEFAULT_CLIENT_COOKIE_EXPIRES: i64 = 365 * 24 * 60 * 60;
const DEFAULT_TOKEN_LENGTH: usize = 32;

/// Shortest token the generator may be configured for.
pub const MIN_TOKEN_LENGTH: usize = 8;
/// Longest token the generator may be configured for.
pub const MAX_TOKEN_LENGTH: usize = 128;
/// Longest client cookie lifetime accepted, one hundred years.
pub const MAX_CLIENT_COOKIE_EXPIRES: i64 = 100 * 365 * 24 * 60 * 60;

/// `SameSite` attribute applied to both tracking cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSitePolicy {
    /// No `SameSite` attribute is emitted; the browser default applies.
    #[default]
    Unset,
    Strict,
    Lax,
    None,
}

impl FromStr for SameSitePolicy {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Ok(Self::Unset),
            "strict" => Ok(Self::Strict),
            "lax" => Ok(Self::Lax),
            "none" => Ok(Self::None),
            other => Err(TrackingError::Config(format!(
                "same_site must be 'strict', 'lax', 'none', or empty, got {other}"
            ))),
        }
    }
}

/// Attributes and naming of the client and session cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct CookieSettings {
    /// `Domain` attribute. `None` or empty leaves the cookie host-only.
    pub domain: Option<String>,
    /// Prefix joined to both cookie names with a dash.
    pub cookie_name_prefix: String,
    /// Suffix of the long-lived client cookie name.
    pub client_cookie_name: String,
    /// Suffix of the browser-session cookie name.
    pub session_cookie_name: String,
    /// Client cookie lifetime in seconds. Zero makes it a session cookie too.
    pub client_cookie_expires: i64,
    pub http_only: bool,
    pub secure: bool,
    /// Exact length of generated identifiers.
    pub length: usize,
    pub same_site: SameSitePolicy,
    /// Re-send an existing client identifier with a fresh expiry on every request.
    pub sliding_expiry: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            domain: None,
            cookie_name_prefix: DEFAULT_COOKIE_NAME_PREFIX.to_string(),
            client_cookie_name: DEFAULT_CLIENT_COOKIE_NAME.to_string(),
            session_cookie_name: DEFAULT_SESSION_COOKIE_NAME.to_string(),
            client_cookie_expires: DEFAULT_CLIENT_COOKIE_EXPIRES,
            http_only: false,
            secure: false,
            length: DEFAULT_TOKEN_LENGTH,
            same_site: SameSitePolicy::Unset,
            sliding_expiry: false,
        }
    }
}

impl CookieSettings {
    /// Checks the static settings.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::Config` when the token length is outside
    /// `8..=128`, the client expiry is negative or beyond one hundred years,
    /// or a cookie name or the domain cannot appear in a `Set-Cookie` header.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_TOKEN_LENGTH..=MAX_TOKEN_LENGTH).contains(&self.length) {
            return Err(TrackingError::Config(format!(
                "length must be between {MIN_TOKEN_LENGTH} and {MAX_TOKEN_LENGTH}, got {}",
                self.length
            )));
        }

        if self.client_cookie_expires < 0 {
            return Err(TrackingError::Config(format!(
                "client_cookie_expires cannot be negative, got {}",
                self.client_cookie_expires
            )));
        }

        if self.client_cookie_expires > MAX_CLIENT_COOKIE_EXPIRES {
            return Err(TrackingError::Config(format!(
                "client_cookie_expires must be at most {MAX_CLIENT_COOKIE_EXPIRES}, got {}",
                self.client_cookie_expires
            )));
        }

        for name in [
            self.client_cookie_full_name(),
            self.session_cookie_full_name(),
        ] {
            if !is_cookie_token(&name) {
                return Err(TrackingError::Config(format!(
                    "cookie name must be a non-empty token, got {name:?}"
                )));
            }
        }

        if self.client_cookie_full_name() == self.session_cookie_full_name() {
            return Err(TrackingError::Config(
                "client and session cookie names must differ".to_string(),
            ));
        }

        if let Some(domain) = self.domain.as_deref()
            && !domain
                .bytes()
                .all(|b| b.is_ascii_graphic() && b != b';' && b != b',')
        {
            return Err(TrackingError::Config(format!(
                "domain contains invalid characters: {domain:?}"
            )));
        }

        Ok(())
    }

    /// Full name of the long-lived client cookie, e.g. `ttc-cid`.
    #[must_use]
    pub fn client_cookie_full_name(&self) -> String {
        format!("{}-{}", self.cookie_name_prefix, self.client_cookie_name)
    }

    /// Full name of the browser-session cookie, e.g. `ttc-sid`.
    #[must_use]
    pub fn session_cookie_full_name(&self) -> String {
        format!("{}-{}", self.cookie_name_prefix, self.session_cookie_name)
    }
}

// RFC 6265 cookie-name: a token, no separators or controls.
fn is_cookie_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic()
                && !matches!(
                    b,
                    b'(' | b')'
                        | b'<'
                        | b'>'
                        | b'@'
                        | b','
                        | b';'
                        | b':'
                        | b'\\'
                        | b'"'
                        | b'/'
                        | b'['
                        | b']'
                        | b'?'
                        | b'='
                        | b'{'
                        | b'}'
                )
        })
}

fn get_env(key: &str) -> Result<String> {
    env::var(key).map_err(|_| TrackingError::Config(format!("{key} must be set in environment")))
}

fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn get_env_bool(key: &str) -> bool {
    env::var(key)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(false)
}

fn get_env_parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match get_env_opt(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| TrackingError::Config(format!("{key} is invalid ({raw:?}): {e}"))),
        None => Ok(default),
    }
}

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the proxy listens on.
    pub listen_addr: SocketAddr,
    /// Backend URL to proxy requests to.
    pub backend_url: String,
    /// Logging format: "json" or "pretty".
    pub log_format: String,
    /// Tracking cookie attributes.
    pub cookies: CookieSettings,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::Config` if `BACKEND_URL` is missing, a numeric
    /// or address variable does not parse, `COOKIE_SAME_SITE` is not one of
    /// the accepted values, or the resulting cookie settings fail validation.
    pub fn from_env() -> Result<Arc<Self>> {
        let listen_addr = get_env_parse_or("LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;
        let backend_url = get_env("BACKEND_URL")?;
        let log_format = get_env_or("LOG_FORMAT", "json");

        let defaults = CookieSettings::default();
        let cookies = CookieSettings {
            domain: get_env_opt("COOKIE_DOMAIN"),
            cookie_name_prefix: get_env_or("COOKIE_NAME_PREFIX", &defaults.cookie_name_prefix),
            client_cookie_name: get_env_or("CLIENT_COOKIE_NAME", &defaults.client_cookie_name),
            session_cookie_name: get_env_or("SESSION_COOKIE_NAME", &defaults.session_cookie_name),
            client_cookie_expires: get_env_parse_or(
                "CLIENT_COOKIE_EXPIRES",
                defaults.client_cookie_expires,
            )?,
            http_only: get_env_bool("COOKIE_HTTP_ONLY"),
            secure: get_env_bool("COOKIE_SECURE"),
            length: get_env_parse_or("COOKIE_LENGTH", defaults.length)?,
            same_site: get_env_or("COOKIE_SAME_SITE", "").to_lowercase().parse()?,
            sliding_expiry: get_env_bool("CLIENT_COOKIE_SLIDING"),
        };
        cookies.validate()?;

        Ok(Arc::new(Self {
            listen_addr,
            backend_url,
            log_format,
            cookies,
        }))
    }
}
