//! Process-lifetime trust records
//!
//! The store is the only state shared across threads without going through
//! the dispatcher: the command-channel task reads and updates it, the host
//! thread writes it from the confirmation gate. Records map a key
//! fingerprint to the highest nonce accepted from that key. They are created
//! only by the gate and never deleted.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::error::BridgeError;
use crate::trust::KeyFingerprint;

#[derive(Debug, Default)]
pub struct TrustStore {
    records: Mutex<HashMap<KeyFingerprint, u64>>,
}

impl TrustStore {
    pub fn new() -> Self {
        TrustStore::default()
    }

    /// Last accepted nonce for the key, if the operator has confirmed it.
    pub fn last_nonce(&self, fingerprint: &KeyFingerprint) -> Option<u64> {
        self.lock().get(fingerprint).copied()
    }

    pub fn is_trusted(&self, fingerprint: &KeyFingerprint) -> bool {
        self.lock().contains_key(fingerprint)
    }

    /// Record operator confirmation of a key. The confirmation gate is the
    /// only caller; this is the sole way a record comes into existence.
    pub fn trust(&self, fingerprint: KeyFingerprint, nonce: u64) {
        debug!(%fingerprint, nonce, "trusting key");
        self.lock().insert(fingerprint, nonce);
    }

    /// Accept a command nonce for an already-confirmed key. The comparison
    /// and the update happen in one critical section so no reader can
    /// observe a half-applied record. Refuses keys with no record: the
    /// listener must not be able to promote a key past the gate.
    pub fn accept(&self, fingerprint: &KeyFingerprint, nonce: u64) -> Result<(), BridgeError> {
        let mut records = self.lock();
        let last_nonce = records.get_mut(fingerprint).ok_or(BridgeError::UnknownKey)?;

        if nonce <= *last_nonce {
            return Err(BridgeError::ReplayRejected {
                nonce,
                last_nonce: *last_nonce,
            });
        }

        *last_nonce = nonce;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<KeyFingerprint, u64>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
