//! First-contact confirmation ceremony
//!
//! A key with no trust record can never be silently trusted: the envelope
//! is parked on the host thread and the operator is asked to type the
//! digest their development environment printed. Only a match creates the
//! trust record. This is trust-on-first-use, not a PKI — its security rests
//! on the operator comparing the digest through a side channel.

use crate::dispatch::ERROR_DIALOG_TITLE;
use crate::error::BridgeError;
use crate::host::Host;
use crate::protocol::{CommandEnvelope, InnerCommand};
use crate::trust::{hasher, TrustStore};

const PROMPT: &str = "New drawbridge connection detected.\n\
    \n\
    Please enter the caller's public key digest below to proceed.\n\
    It is printed by the development environment that initiated the\n\
    connection.\n\
    \n\
    If you did not initiate or expect this connection, press cancel\n\
    to abort.";

const PROMPT_TITLE: &str = "Connection verification";

/// Ask the operator to confirm the envelope's key. Returns the inner
/// command to execute when the operator confirmed and the digest matched;
/// any error means the request was dropped with no trust-state change.
/// Operator-facing dialogs happen here; the caller only logs.
pub(crate) fn confirm_first_contact(
    envelope: &CommandEnvelope,
    trust: &TrustStore,
    host: &mut dyn Host,
) -> Result<InnerCommand, BridgeError> {
    let typed = match host.input_box(PROMPT, PROMPT_TITLE) {
        Some(value) => value,
        None => return Err(BridgeError::ConfirmationCancelled),
    };

    let fingerprint = envelope.fingerprint();
    let digest = hasher::confirmation_digest(&fingerprint);

    if !hasher::digest_matches(&typed, &digest) {
        host.show_message(
            "The public key digest does not match. Aborting.",
            ERROR_DIALOG_TITLE,
        );
        return Err(BridgeError::ConfirmationMismatch);
    }

    let command = match envelope.inner() {
        Ok(command) => command,
        Err(err) => {
            host.show_message(
                &format!("The confirmed request could not be read.\n\n{err}"),
                ERROR_DIALOG_TITLE,
            );
            return Err(err);
        }
    };

    trust.trust(fingerprint, command.nonce);
    Ok(command)
}
