//! Shared helpers for the end-to-end tests: a caller that signs real
//! envelopes and a host whose calls the test thread can observe.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Result;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha256};

use drawbridge_core::trust::{hasher, KeyFingerprint};
use drawbridge_core::{Host, MainLoop};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Script(PathBuf),
    Attach { port: u16 },
    Detach,
    Prompt,
    Message(String),
}

/// Host whose state lives behind `Arc` so the test thread can script
/// prompt answers and watch calls while the main loop runs elsewhere.
#[derive(Clone, Default)]
pub struct SharedHost {
    pub events: Arc<Mutex<Vec<HostEvent>>>,
    pub prompt_answers: Arc<Mutex<VecDeque<Option<String>>>>,
}

impl SharedHost {
    pub fn answer_next_prompt(&self, answer: Option<&str>) {
        self.prompt_answers
            .lock()
            .unwrap()
            .push_back(answer.map(str::to_string));
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: HostEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Host for SharedHost {
    fn run_script(&mut self, path: &Path) -> Result<()> {
        self.record(HostEvent::Script(path.to_path_buf()));
        Ok(())
    }

    fn attach_debugger(&mut self, port: u16, _pydevd_path: &Path) -> Result<()> {
        self.record(HostEvent::Attach { port });
        Ok(())
    }

    fn detach_debugger(&mut self) -> Result<()> {
        self.record(HostEvent::Detach);
        Ok(())
    }

    fn input_box(&mut self, _prompt: &str, _title: &str) -> Option<String> {
        self.record(HostEvent::Prompt);
        self.prompt_answers.lock().unwrap().pop_front().flatten()
    }

    fn show_message(&mut self, text: &str, _title: &str) {
        self.record(HostEvent::Message(text.to_string()));
    }
}

/// Drive the main loop on a dedicated thread, standing in for the host
/// application's own thread. The loop exits when the bridge is stopped.
pub fn spawn_host_thread(mut main_loop: MainLoop, host: SharedHost) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut host = host;
        main_loop.run(&mut host);
    })
}

/// The remote development environment's end of the protocol.
pub struct Caller {
    key: RsaPrivateKey,
}

impl Caller {
    pub fn new() -> Caller {
        let mut rng = rand::thread_rng();
        Caller {
            key: RsaPrivateKey::new(&mut rng, 1024).expect("test key generation"),
        }
    }

    pub fn fingerprint(&self) -> KeyFingerprint {
        let public = self.key.to_public_key();
        KeyFingerprint::new(&public.n().to_string(), &public.e().to_string())
    }

    /// The digest the caller-side tooling would print for the operator.
    pub fn confirmation_digest(&self) -> String {
        hasher::confirmation_digest(&self.fingerprint())
    }

    /// A correctly signed envelope around the given inner-command JSON.
    pub fn envelope(&self, message: &str) -> String {
        self.envelope_with_message_override(message, None)
    }

    /// A signed envelope whose message is swapped after signing.
    pub fn tampered_envelope(&self, signed_message: &str, sent_message: &str) -> String {
        self.envelope_with_message_override(signed_message, Some(sent_message))
    }

    fn envelope_with_message_override(&self, signed: &str, sent: Option<&str>) -> String {
        let public = self.key.to_public_key();
        let signature = self
            .key
            .sign(
                Pkcs1v15Sign::new::<Sha256>(),
                &Sha256::digest(signed.as_bytes()),
            )
            .expect("test signing");

        serde_json::json!({
            "pubkey_modulus": public.n().to_string(),
            "pubkey_exponent": public.e().to_string(),
            "message": sent.unwrap_or(signed),
            "signature": hex::encode(signature),
        })
        .to_string()
    }
}

/// POST a body to a bridge's command channel.
pub fn post_command(port: u16, body: String) -> (u16, String) {
    let response = reqwest::blocking::Client::new()
        .post(format!("http://127.0.0.1:{port}/"))
        .body(body)
        .send()
        .expect("command channel reachable");
    let status = response.status().as_u16();
    (status, response.text().unwrap_or_default())
}

/// Poll until `pred` holds or a generous deadline passes.
pub fn wait_until(pred: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if pred() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}
