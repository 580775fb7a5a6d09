//! Basic authentication gate

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::HeaderValue;
use statiq_core::{Credentials, ServerConfig};

/// Realm announced in the `WWW-Authenticate` challenge
pub const REALM: &str = "Restricted Area";

/// Checks `Authorization` headers against the configured users
#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    credentials: Credentials,
}

impl AccessGate {
    /// Create a gate for these credentials; an empty table disables it
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Create a gate from the server configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.credentials.clone())
    }

    /// Whether requests are checked at all
    pub fn is_enabled(&self) -> bool {
        !self.credentials.is_empty()
    }

    /// Validate an `Authorization` header
    pub fn authorize(&self, header: Option<&HeaderValue>) -> bool {
        if !self.is_enabled() {
            return true;
        }

        let Some((username, password)) = header.and_then(parse_basic) else {
            return false;
        };

        match self.credentials.get(&username) {
            Some(expected) => constant_time_eq(expected.as_bytes(), password.as_bytes()),
            None => {
                // Same amount of work as a known user with a wrong password
                std::hint::black_box(constant_time_eq(password.as_bytes(), password.as_bytes()));
                false
            }
        }
    }

    /// `WWW-Authenticate` value sent with 401 responses
    pub fn challenge() -> HeaderValue {
        HeaderValue::from_static("Basic realm=\"Restricted Area\"")
    }
}

/// Decode `Basic <base64(user:pass)>`
fn parse_basic(header: &HeaderValue) -> Option<(String, String)> {
    let value = header.to_str().ok()?.trim();
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

// Constant-time comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
