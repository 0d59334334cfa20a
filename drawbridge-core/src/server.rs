//! Loopback command listener
//!
//! Accepts signed command envelopes over HTTP on an OS-assigned loopback
//! port, so several host instances can run side by side. Signature and
//! nonce decisions are made here on the channel task; anything that must
//! touch the host goes through the dispatcher. The response acknowledges
//! acceptance only — execution is asynchronous relative to it.

use std::net::Ipv4Addr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{debug, error};

use crate::dispatch::{Dispatcher, WorkItem};
use crate::error::BridgeError;
use crate::protocol::CommandEnvelope;
use crate::trust::{verifier, TrustStore};

pub(crate) struct ListenerState {
    pub trust: Arc<TrustStore>,
    pub dispatcher: Dispatcher,
}

/// Bind the command listener on a loopback port chosen by the OS.
pub(crate) async fn bind() -> std::io::Result<TcpListener> {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await
}

/// Serve the command channel until the runtime shuts down.
pub(crate) async fn serve(listener: TcpListener, state: Arc<ListenerState>) -> std::io::Result<()> {
    let app = Router::new()
        .route("/", post(handle_command))
        .with_state(state);
    axum::serve(listener, app).await
}

async fn handle_command(
    State(state): State<Arc<ListenerState>>,
    body: String,
) -> (StatusCode, String) {
    match process(&state, &body) {
        Ok(()) => (StatusCode::OK, "done".to_string()),
        Err(err) => {
            error!("error while handling command request: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

/// The accept pipeline: parse, authenticate, then either route first
/// contact to the confirmation gate or check the nonce and dispatch.
fn process(state: &ListenerState, body: &str) -> Result<(), BridgeError> {
    let envelope = CommandEnvelope::parse(body)?;
    verifier::verify(&envelope)?;

    let fingerprint = envelope.fingerprint();

    if !state.trust.is_trusted(&fingerprint) {
        // The caller gets its acknowledgment now; confirmation continues
        // asynchronously on the host thread and owes the caller nothing.
        debug!(%fingerprint, "first contact, deferring to operator confirmation");
        return state.dispatcher.enqueue(WorkItem::VerifyCommand(envelope));
    }

    let command = envelope.inner()?;
    state.trust.accept(&fingerprint, command.nonce)?;
    debug!(%fingerprint, nonce = command.nonce, "command accepted");
    state.dispatcher.enqueue(WorkItem::RunCommand(command))
}
