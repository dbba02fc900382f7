//! Core system components.
//!
//! Contains the cookie middleware and the reverse proxy that applies it.

pub mod middleware;
pub mod proxy;
