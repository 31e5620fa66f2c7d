// Session token fingerprinting

use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 fingerprint of a session token (64-character hex string)
///
/// Used as the session cache key and in log fields, so raw tokens are
/// never stored or printed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionFingerprint(String);

impl SessionFingerprint {
    pub fn of(token: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, enough to correlate log lines
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for SessionFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

/// Session token as received in the cookie; Debug output is redacted
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: &str) -> Self {
        Self(token.to_string())
    }

    pub fn fingerprint(&self) -> SessionFingerprint {
        SessionFingerprint::of(&self.0)
    }

    /// Raw token, for forwarding to the identity service only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("token", &"<REDACTED>")
            .finish()
    }
}
