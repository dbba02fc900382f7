//! Middleware components.
//!
//! Includes identifier generation, the cookie assignment logic and its
//! tower layer.

mod cookie;
mod layer;
mod token;

pub use cookie::{
    Assignment, CLIENT_COOKIE_ERROR_HEADER, SESSION_COOKIE_ERROR_HEADER, TrackingCookies,
    TrackingIds,
};
pub use layer::{ResponseFuture, TrackingCookieLayer, TrackingCookieService};
pub use token::{OsTokenSource, TokenSource, generate_token, generate_token_with};
