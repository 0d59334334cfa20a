//! Wire types for the command channel
//!
//! The envelope is the signed unit a caller POSTs to the command listener.
//! `message` stays a JSON string rather than a nested object because the
//! signature covers those exact bytes; re-serializing would break it.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::trust::KeyFingerprint;

/// Signed wire unit submitted to the command listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// RSA modulus as a decimal string
    pub pubkey_modulus: String,
    /// RSA public exponent as a decimal string
    pub pubkey_exponent: String,
    /// JSON-encoded `InnerCommand`, as text
    pub message: String,
    /// Hex-encoded PKCS#1 v1.5 signature over `message`
    pub signature: String,
}

impl CommandEnvelope {
    pub fn parse(body: &str) -> Result<Self, BridgeError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Trust identity of the embedded public key.
    pub fn fingerprint(&self) -> KeyFingerprint {
        KeyFingerprint::new(&self.pubkey_modulus, &self.pubkey_exponent)
    }

    /// Parse the signed payload.
    pub fn inner(&self) -> Result<InnerCommand, BridgeError> {
        InnerCommand::parse(&self.message)
    }
}

/// The signed payload: what the caller wants the host to do.
///
/// At least one of a script run or a debugger attach must be requested;
/// neither is a no-op that gets logged and dropped at execution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InnerCommand {
    /// Strictly increasing per caller key; replay protection
    pub nonce: u64,
    /// Script the host should run, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// 1 to attach a debugger before running the script
    #[serde(default)]
    pub debug: u8,
    /// Caller-side listener the debugger should attach back to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_port: Option<u16>,
    /// Debugger distribution the host should load
    #[serde(default)]
    pub pydevd_path: String,
}

impl InnerCommand {
    pub fn parse(message: &str) -> Result<Self, BridgeError> {
        Ok(serde_json::from_str(message)?)
    }

    pub fn debug_requested(&self) -> bool {
        self.debug != 0
    }

    /// Neither a script run nor a debugger attach was asked for.
    pub fn is_noop(&self) -> bool {
        self.script.is_none() && !self.debug_requested()
    }
}
