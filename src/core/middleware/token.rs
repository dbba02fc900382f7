//! Identifier generation.
//!
//! Produces URL-safe base64 tokens of an exact length from the OS CSPRNG.

use crate::config::{Result, TrackingError};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::TryRngCore;
use rand::rngs::OsRng;

/// Source of random bytes for identifiers.
pub trait TokenSource: Send + Sync {
    /// Fills `buf` entirely with random bytes.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::Random` if the source is unavailable.
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}

/// Operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsTokenSource;

impl TokenSource for OsTokenSource {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| TrackingError::Random(format!("failed to generate random bytes: {e}")))
    }
}

/// Generates a token of exactly `length` characters from the OS CSPRNG.
///
/// # Errors
///
/// Returns `TrackingError::Random` if `length` is zero or the OS random
/// source fails.
pub fn generate_token(length: usize) -> Result<String> {
    generate_token_with(&OsTokenSource, length)
}

/// Generates a token of exactly `length` characters from `source`.
///
/// Four base64 characters carry three bytes, so `ceil(3 * length / 4)` bytes
/// always encode to at least `length` characters before truncation.
///
/// # Errors
///
/// Returns `TrackingError::Random` if `length` is zero or `source` fails.
pub fn generate_token_with(source: &dyn TokenSource, length: usize) -> Result<String> {
    if length == 0 {
        return Err(TrackingError::Random(
            "length must be positive, got 0".to_string(),
        ));
    }

    let mut buffer = vec![0u8; (length * 3).div_ceil(4)];
    source.fill(&mut buffer)?;

    let mut encoded = URL_SAFE_NO_PAD.encode(&buffer);
    encoded.truncate(length);
    Ok(encoded)
}
