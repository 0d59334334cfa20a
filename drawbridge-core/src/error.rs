//! Bridge error types
//!
//! Request-shaped failures (`MalformedRequest`, `InvalidKey`,
//! `AuthenticationFailure`, `ReplayRejected`) are resolved on the
//! command-channel task and become `500` response bodies. Confirmation
//! outcomes surface only to the operator; discovery parse errors are logged
//! and the datagram dropped.

use thiserror::Error;

/// Everything that can go wrong between a datagram arriving and a command
/// reaching the host thread.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Envelope or inner command body could not be parsed
    #[error("malformed request: {detail}")]
    MalformedRequest { detail: String },

    /// Public key could not be reconstructed from the envelope
    #[error("invalid public key: {detail}")]
    InvalidKey { detail: String },

    /// Signature did not verify over the message bytes
    #[error("signature verification failed")]
    AuthenticationFailure,

    /// Nonce was not strictly greater than the last accepted one for the key
    #[error("replayed command rejected: nonce {nonce} is not greater than {last_nonce}")]
    ReplayRejected { nonce: u64, last_nonce: u64 },

    /// Accept path saw a key with no trust record
    #[error("no trust record for this key")]
    UnknownKey,

    /// Operator cancelled the first-contact confirmation prompt
    #[error("confirmation cancelled by operator")]
    ConfirmationCancelled,

    /// Operator's typed digest did not match the key's digest
    #[error("confirmation digest mismatch")]
    ConfirmationMismatch,

    /// A work item could not be enqueued for the host thread
    #[error("dispatch failed: {detail}")]
    DispatchFailure { detail: String },

    /// Discovery datagram could not be parsed
    #[error("malformed discovery datagram: {detail}")]
    DiscoveryParse { detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::MalformedRequest {
            detail: err.to_string(),
        }
    }
}
