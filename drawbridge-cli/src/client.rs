//! Key handling, the discovery client, and signed command submission.
//!
//! This is the mirror image of the host side: where the bridge verifies
//! PKCS#1 v1.5 signatures and answers search queries, the client signs and
//! asks. The millisecond timestamp nonce satisfies the strictly-increasing
//! requirement as long as commands are not submitted faster than the clock
//! ticks, which an interactive tool never is.

use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use tokio::net::UdpSocket;
use tracing::debug;

use drawbridge_core::config::{DISCOVERY_PORT, MULTICAST_GROUP, SEARCH_TARGET};
use drawbridge_core::protocol::{CommandEnvelope, InnerCommand};
use drawbridge_core::trust::{hasher, KeyFingerprint};

pub fn keygen(out: &Path, bits: usize) -> Result<()> {
    let mut rng = rand::thread_rng();
    let key = RsaPrivateKey::new(&mut rng, bits).context("failed to generate RSA key")?;

    key.to_pkcs8_pem(LineEnding::LF)
        .context("failed to encode private key")
        .and_then(|pem| {
            std::fs::write(out, pem.as_bytes())
                .with_context(|| format!("failed to write {}", out.display()))
        })?;

    println!("private key written to {}", out.display());
    println!("public key digest: {}", key_digest(&key.to_public_key()));
    Ok(())
}

/// The digest the host's operator is asked to compare on first contact.
fn key_digest(key: &RsaPublicKey) -> String {
    let fingerprint = KeyFingerprint::new(&key.n().to_string(), &key.e().to_string());
    hasher::confirmation_digest(&fingerprint)
}

pub async fn discover(pid: Option<u32>, timeout_ms: u64) -> Result<()> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .await
        .context("failed to bind discovery socket")?;

    let query =
        format!("M-SEARCH * HTTP/1.1\r\nMAN: \"ssdp:discover\"\r\nST: {SEARCH_TARGET}\r\n\r\n");
    socket
        .send_to(query.as_bytes(), (MULTICAST_GROUP, DISCOVERY_PORT))
        .await
        .context("failed to send discovery query")?;

    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    let mut buf = [0u8; 2048];
    let mut found = 0usize;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        let received = match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(received) => received?,
            Err(_) => break,
        };

        let (len, peer) = received;
        let Some(instance) = Instance::parse(&buf[..len]) else {
            debug!(%peer, "ignoring unparseable discovery response");
            continue;
        };

        if pid.is_some_and(|wanted| wanted != instance.pid) {
            continue;
        }

        println!("pid {} -> {}", instance.pid, instance.location);
        found += 1;
    }

    if found == 0 {
        bail!("no instances responded");
    }
    Ok(())
}

struct Instance {
    pid: u32,
    location: String,
}

impl Instance {
    /// Parse an `HTTP/1.1 200 OK` discovery response carrying
    /// `USN: pid:<pid>` and `Location:` headers.
    fn parse(datagram: &[u8]) -> Option<Instance> {
        let text = std::str::from_utf8(datagram).ok()?;
        let mut lines = text.split("\r\n");

        if lines.next()?.trim_end() != "HTTP/1.1 200 OK" {
            return None;
        }

        let mut pid = None;
        let mut location = None;
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            match name.trim().to_ascii_lowercase().as_str() {
                "usn" => {
                    pid = value
                        .trim()
                        .strip_prefix("pid:")
                        .and_then(|digits| digits.parse().ok());
                }
                "location" => location = Some(value.trim().to_string()),
                _ => {}
            }
        }

        Some(Instance {
            pid: pid?,
            location: location?,
        })
    }
}

pub async fn run(
    key_path: &Path,
    port: u16,
    script: Option<&Path>,
    debug_port: Option<u16>,
    pydevd_path: &str,
) -> Result<()> {
    if script.is_none() && debug_port.is_none() {
        bail!("nothing to request: pass --script, --debug-port, or both");
    }

    let key = RsaPrivateKey::read_pkcs8_pem_file(key_path)
        .with_context(|| format!("failed to read key from {}", key_path.display()))?;
    let public = key.to_public_key();

    let command = InnerCommand {
        nonce: Utc::now().timestamp_millis() as u64,
        script: script.map(|path| path.to_string_lossy().into_owned()),
        debug: u8::from(debug_port.is_some()),
        debug_port,
        pydevd_path: pydevd_path.to_string(),
    };
    let message = serde_json::to_string(&command)?;

    let signature = key
        .sign(
            Pkcs1v15Sign::new::<Sha256>(),
            &Sha256::digest(message.as_bytes()),
        )
        .context("failed to sign command")?;

    let envelope = CommandEnvelope {
        pubkey_modulus: public.n().to_string(),
        pubkey_exponent: public.e().to_string(),
        message,
        signature: hex::encode(signature),
    };

    // Printed before submission: on first contact the host operator needs
    // this value while the confirmation prompt is up.
    println!(
        "public key digest (for first-contact confirmation): {}",
        key_digest(&public)
    );

    let url = format!("http://127.0.0.1:{port}/");
    debug!(%url, nonce = command.nonce, "submitting command");

    let response = reqwest::Client::new()
        .post(&url)
        .body(serde_json::to_string(&envelope)?)
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status.is_success() {
        println!("accepted: {body}");
        Ok(())
    } else {
        Err(anyhow!("instance rejected the command ({status}): {body}"))
    }
}
