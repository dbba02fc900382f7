//! Tracking cookie assignment.
//!
//! Decides, per request, which of the client and session cookies must be
//! issued and renders their `Set-Cookie` values. Nothing is stored server
//! side; the decision depends only on the request's `Cookie` headers.

use super::token::{OsTokenSource, TokenSource, generate_token_with};
use crate::config::{CookieSettings, Result, SameSitePolicy, TrackingError};
use cookie::time::{Duration, OffsetDateTime};
use cookie::{Cookie, SameSite};
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use tracing::{debug, warn};

/// Response header set when the client cookie could not be generated.
pub const CLIENT_COOKIE_ERROR_HEADER: &str = "x-client-cookie-error";
/// Response header set when the session cookie could not be generated.
pub const SESSION_COOKIE_ERROR_HEADER: &str = "x-session-cookie-error";

const CLIENT_COOKIE_ERROR: &str = "failed to generate client cookie";
const SESSION_COOKIE_ERROR: &str = "failed to generate session cookie";

/// Identifiers in effect for a request, whether presented or newly issued.
///
/// Inserted into request extensions by the tower layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackingIds {
    pub client_id: Option<String>,
    pub session_id: Option<String>,
}

/// Outcome of inspecting one request.
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    set_cookies: Vec<HeaderValue>,
    errors: Vec<(HeaderName, HeaderValue)>,
    ids: TrackingIds,
}

impl Assignment {
    /// `Set-Cookie` values to append to the response.
    #[must_use]
    pub fn set_cookies(&self) -> &[HeaderValue] {
        &self.set_cookies
    }

    /// Error marker headers for cookies that could not be issued.
    #[must_use]
    pub fn errors(&self) -> &[(HeaderName, HeaderValue)] {
        &self.errors
    }

    #[must_use]
    pub const fn ids(&self) -> &TrackingIds {
        &self.ids
    }

    /// Whether the response needs no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set_cookies.is_empty() && self.errors.is_empty()
    }

    /// Writes the cookies and error markers into response headers.
    ///
    /// `Set-Cookie` values are appended so cookies set by the inner handler survive.
    pub fn apply(&self, headers: &mut HeaderMap) {
        for value in &self.set_cookies {
            headers.append(SET_COOKIE, value.clone());
        }
        for (name, value) in &self.errors {
            headers.insert(name.clone(), value.clone());
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Client,
    Session,
}

/// Issues client and session tracking cookies.
#[derive(Clone)]
pub struct TrackingCookies {
    settings: CookieSettings,
    client_name: String,
    session_name: String,
    source: Arc<dyn TokenSource>,
}

impl std::fmt::Debug for TrackingCookies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingCookies")
            .field("client_name", &self.client_name)
            .field("session_name", &self.session_name)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TrackingCookies {
    /// Creates an issuer backed by the OS random source.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::Config` if `settings` fail validation.
    pub fn new(settings: CookieSettings) -> Result<Self> {
        Self::with_source(settings, Arc::new(OsTokenSource))
    }

    /// Creates an issuer drawing identifiers from `source`.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::Config` if `settings` fail validation.
    pub fn with_source(settings: CookieSettings, source: Arc<dyn TokenSource>) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            client_name: settings.client_cookie_full_name(),
            session_name: settings.session_cookie_full_name(),
            settings,
            source,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &CookieSettings {
        &self.settings
    }

    #[must_use]
    pub fn client_cookie_name(&self) -> &str {
        &self.client_name
    }

    #[must_use]
    pub fn session_cookie_name(&self) -> &str {
        &self.session_name
    }

    /// Inspects request headers and decides which cookies to issue.
    ///
    /// Generation failures never abort the request; they surface as error
    /// marker headers on the returned assignment.
    #[must_use]
    pub fn assign(&self, request_headers: &HeaderMap) -> Assignment {
        let (presented_client, presented_session) = self.presented(request_headers);
        let mut assignment = Assignment::default();

        let renew_client =
            self.settings.sliding_expiry && self.settings.client_cookie_expires > 0;
        match presented_client {
            Some(value) if renew_client => self.push(&mut assignment, Slot::Client, Ok(value)),
            Some(value) => assignment.ids.client_id = Some(value),
            None => {
                let token = self.issue(&self.client_name);
                self.push(&mut assignment, Slot::Client, token);
            }
        }

        match presented_session {
            Some(value) => assignment.ids.session_id = Some(value),
            None => {
                let token = self.issue(&self.session_name);
                self.push(&mut assignment, Slot::Session, token);
            }
        }

        assignment
    }

    /// Renders `token` into the assignment, or records an error marker.
    fn push(&self, assignment: &mut Assignment, slot: Slot, token: Result<String>) {
        let (name, ttl_secs) = match slot {
            Slot::Client => (&self.client_name, self.settings.client_cookie_expires),
            Slot::Session => (&self.session_name, 0),
        };

        match token.and_then(|value| Ok((self.render(name, &value, ttl_secs)?, value))) {
            Ok((header, value)) => {
                assignment.set_cookies.push(header);
                match slot {
                    Slot::Client => assignment.ids.client_id = Some(value),
                    Slot::Session => assignment.ids.session_id = Some(value),
                }
            }
            Err(e) => {
                warn!(cookie = %name, error = %e, "Tracking cookie not issued");
                let (header, message) = match slot {
                    Slot::Client => (CLIENT_COOKIE_ERROR_HEADER, CLIENT_COOKIE_ERROR),
                    Slot::Session => (SESSION_COOKIE_ERROR_HEADER, SESSION_COOKIE_ERROR),
                };
                assignment.errors.push((
                    HeaderName::from_static(header),
                    HeaderValue::from_static(message),
                ));
            }
        }
    }

    fn issue(&self, name: &str) -> Result<String> {
        let value = generate_token_with(self.source.as_ref(), self.settings.length)?;
        debug!(cookie = %name, "Issuing tracking cookie");
        Ok(value)
    }

    /// Finds the first value of each tracking cookie across all `Cookie` headers.
    ///
    /// Pairs are split on raw bytes so a malformed neighbour only loses
    /// itself. A bare name without `=` counts as present with an empty value.
    fn presented(&self, headers: &HeaderMap) -> (Option<String>, Option<String>) {
        let mut client = None;
        let mut session = None;

        for header in headers.get_all(COOKIE) {
            for pair in header.as_bytes().split(|&b| b == b';') {
                let pair = pair.trim_ascii();
                let (name, value) = match pair.iter().position(|&b| b == b'=') {
                    Some(eq) => (pair[..eq].trim_ascii(), pair[eq + 1..].trim_ascii()),
                    None => (pair, &b""[..]),
                };

                let slot = if name == self.client_name.as_bytes() {
                    &mut client
                } else if name == self.session_name.as_bytes() {
                    &mut session
                } else {
                    continue;
                };

                if slot.is_none() {
                    *slot = Some(cookie_value(value));
                }
            }
        }

        (client, session)
    }

    /// Renders a `Set-Cookie` value. `ttl_secs == 0` omits `Max-Age` and `Expires`.
    fn render(&self, name: &str, value: &str, ttl_secs: i64) -> Result<HeaderValue> {
        let mut builder = Cookie::build((name.to_string(), value.to_string()))
            .path("/")
            .http_only(self.settings.http_only)
            .secure(self.settings.secure);

        if let Some(domain) = self.settings.domain.as_deref().filter(|d| !d.is_empty()) {
            builder = builder.domain(domain.to_string());
        }

        if let Some(same_site) = same_site_attr(self.settings.same_site) {
            builder = builder.same_site(same_site);
        }

        if ttl_secs > 0 {
            let ttl = Duration::seconds(ttl_secs);
            let expires = OffsetDateTime::now_utc().checked_add(ttl).ok_or_else(|| {
                TrackingError::Header(format!("expiry of {ttl_secs}s is out of range"))
            })?;
            builder = builder.max_age(ttl).expires(expires);
        }

        HeaderValue::from_str(&builder.build().to_string())
            .map_err(|e| TrackingError::Header(e.to_string()))
    }
}

/// Decodes a raw cookie value, dropping one pair of surrounding quotes.
fn cookie_value(raw: &[u8]) -> String {
    let unquoted = raw
        .strip_prefix(b"\"")
        .and_then(|v| v.strip_suffix(b"\""))
        .unwrap_or(raw);
    String::from_utf8_lossy(unquoted).into_owned()
}

const fn same_site_attr(policy: SameSitePolicy) -> Option<SameSite> {
    match policy {
        SameSitePolicy::Unset => None,
        SameSitePolicy::Strict => Some(SameSite::Strict),
        SameSitePolicy::Lax => Some(SameSite::Lax),
        SameSitePolicy::None => Some(SameSite::None),
    }
}
