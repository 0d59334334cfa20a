//! Envelope signature verification
//!
//! The envelope embeds the caller's RSA public key as decimal modulus and
//! exponent strings; the signature is PKCS#1 v1.5 over the raw message
//! bytes. The wire format does not pin the caller's digest choice, so
//! verification tries each supported digest against the padding. Nothing
//! here touches the trust store: authentication happens before, and
//! independently of, any trust decision.

use rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use tracing::trace;

use crate::error::BridgeError;
use crate::protocol::CommandEnvelope;

/// Reconstruct the caller's public key from the envelope.
pub fn public_key(envelope: &CommandEnvelope) -> Result<RsaPublicKey, BridgeError> {
    let n = parse_decimal(&envelope.pubkey_modulus)?;
    let e = parse_decimal(&envelope.pubkey_exponent)?;

    RsaPublicKey::new(n, e).map_err(|err| BridgeError::InvalidKey {
        detail: err.to_string(),
    })
}

fn parse_decimal(value: &str) -> Result<BigUint, BridgeError> {
    BigUint::parse_bytes(value.as_bytes(), 10).ok_or_else(|| BridgeError::InvalidKey {
        detail: format!("not a decimal integer: {value:?}"),
    })
}

/// Verify the envelope's signature over its message bytes.
pub fn verify(envelope: &CommandEnvelope) -> Result<(), BridgeError> {
    let key = public_key(envelope)?;

    let signature = hex::decode(&envelope.signature).map_err(|err| BridgeError::MalformedRequest {
        detail: format!("signature is not valid hex: {err}"),
    })?;

    let message = envelope.message.as_bytes();

    let verified = key
        .verify(
            Pkcs1v15Sign::new::<Sha256>(),
            &Sha256::digest(message),
            &signature,
        )
        .or_else(|_| {
            key.verify(
                Pkcs1v15Sign::new::<Sha512>(),
                &Sha512::digest(message),
                &signature,
            )
        })
        .or_else(|_| {
            key.verify(
                Pkcs1v15Sign::new::<Sha1>(),
                &Sha1::digest(message),
                &signature,
            )
        });

    match verified {
        Ok(()) => {
            trace!("envelope signature verified");
            Ok(())
        }
        Err(_) => Err(BridgeError::AuthenticationFailure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::traits::PublicKeyParts;
    use rsa::RsaPrivateKey;

    fn signed_envelope(message: &str) -> (RsaPrivateKey, CommandEnvelope) {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public = key.to_public_key();

        let signature = key
            .sign(
                Pkcs1v15Sign::new::<Sha256>(),
                &Sha256::digest(message.as_bytes()),
            )
            .unwrap();

        let envelope = CommandEnvelope {
            pubkey_modulus: public.n().to_string(),
            pubkey_exponent: public.e().to_string(),
            message: message.to_string(),
            signature: hex::encode(signature),
        };

        (key, envelope)
    }

    #[test]
    fn valid_signature_verifies() {
        let (_, envelope) = signed_envelope(r#"{"nonce": 1}"#);
        verify(&envelope).unwrap();
    }

    #[test]
    fn sha512_signature_verifies() {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public = key.to_public_key();
        let message = r#"{"nonce": 2}"#;

        let signature = key
            .sign(
                Pkcs1v15Sign::new::<Sha512>(),
                &Sha512::digest(message.as_bytes()),
            )
            .unwrap();

        let envelope = CommandEnvelope {
            pubkey_modulus: public.n().to_string(),
            pubkey_exponent: public.e().to_string(),
            message: message.to_string(),
            signature: hex::encode(signature),
        };

        verify(&envelope).unwrap();
    }

    #[test]
    fn tampered_message_fails_authentication() {
        let (_, mut envelope) = signed_envelope(r#"{"nonce": 1}"#);
        envelope.message = r#"{"nonce": 999}"#.to_string();

        assert!(matches!(
            verify(&envelope),
            Err(BridgeError::AuthenticationFailure)
        ));
    }

    #[test]
    fn foreign_signature_fails_authentication() {
        let (_, envelope_a) = signed_envelope(r#"{"nonce": 1}"#);
        let (_, mut envelope_b) = signed_envelope(r#"{"nonce": 1}"#);
        envelope_b.signature = envelope_a.signature;

        assert!(matches!(
            verify(&envelope_b),
            Err(BridgeError::AuthenticationFailure)
        ));
    }

    #[test]
    fn non_hex_signature_is_malformed() {
        let (_, mut envelope) = signed_envelope(r#"{"nonce": 1}"#);
        envelope.signature = "not hex".to_string();

        assert!(matches!(
            verify(&envelope),
            Err(BridgeError::MalformedRequest { .. })
        ));
    }

    #[test]
    fn non_decimal_modulus_is_invalid_key() {
        let (_, mut envelope) = signed_envelope(r#"{"nonce": 1}"#);
        envelope.pubkey_modulus = "0xabc".to_string();

        assert!(matches!(
            verify(&envelope),
            Err(BridgeError::InvalidKey { .. })
        ));
    }
}
