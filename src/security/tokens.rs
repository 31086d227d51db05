//! Reconnection token generation.
//!
//! Tokens are opaque, carry no identity, and are safe for URL or header
//! transport. Player and spectator tokens rotate on every successful
//! reconnect to bound the lifetime of a stolen token; the host token does
//! not (host identity is additionally bound to the authenticated user).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use getrandom::fill as fill_random;

/// Raw entropy per token: 256 bits.
const TOKEN_BYTES: usize = 32;

/// Generate an opaque reconnection token.
///
/// Falls back to a UUID pair only if the OS entropy source is unavailable,
/// which on supported platforms does not happen in practice.
pub fn generate() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    if fill_random(&mut bytes).is_err() {
        tracing::error!("OS entropy source unavailable, falling back to UUID-derived token");
        let fallback = format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple());
        return fallback;
    }
    URL_SAFE_NO_PAD.encode(bytes)
}
