//! Confirmation digest for the first-contact ceremony
//!
//! The operator compares this digest against the one printed by the
//! development environment that initiated the connection. SHA-1 is what the
//! caller side of the wire protocol computes; it gates a human comparison
//! through an out-of-band channel, not message integrity.

use sha1::{Digest, Sha1};

use crate::trust::KeyFingerprint;

/// Hex-encoded SHA-1 of the fingerprint string.
pub fn confirmation_digest(fingerprint: &KeyFingerprint) -> String {
    hex::encode(Sha1::digest(fingerprint.as_str().as_bytes()))
}

/// Compare the operator's typed value against the digest.
pub fn digest_matches(typed: &str, digest: &str) -> bool {
    typed.eq_ignore_ascii_case(digest)
}
