//! HTTP Basic credentials for NTRIP 2.0.

use base64::{engine::general_purpose, Engine as _};

/// Encodes `username:password` with the standard base64 alphabet and padding.
pub fn basic_credentials(username: &str, password: &str) -> String {
    general_purpose::STANDARD.encode(format!("{}:{}", username, password))
}

/// Full `Authorization` header value.
pub fn authorization_header(username: &str, password: &str) -> String {
    format!("Basic {}", basic_credentials(username, password))
}
