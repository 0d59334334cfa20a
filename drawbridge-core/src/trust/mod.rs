//! Trust state and envelope authentication
//!
//! A caller's identity is its RSA public key, reduced to the canonical
//! `"<modulus>:<exponent>"` fingerprint. Trust is granted per process
//! lifetime by the operator during the first-contact ceremony and is never
//! persisted; a restart re-runs the ceremony.

pub mod hasher;
pub mod store;
pub mod verifier;

pub use store::TrustStore;

use std::fmt;

/// Canonical identity of a caller's RSA public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyFingerprint(String);

impl KeyFingerprint {
    pub fn new(modulus: &str, exponent: &str) -> Self {
        KeyFingerprint(format!("{modulus}:{exponent}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
