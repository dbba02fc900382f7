//! Proxy service implementation.
//!
//! Forwards requests to a single upstream and attaches tracking cookies to
//! its responses.

pub mod service;

pub use service::{RequestCtx, TrackingProxy};
