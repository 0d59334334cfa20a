//! Main-thread dispatch queue
//!
//! The host application is single threaded: every script run, confirmation
//! prompt, and dialog must happen on its own thread. `Dispatcher` is the
//! producer handle the listener tasks hold; `MainLoop` is the single
//! consumer the embedder drives from that thread. Items run one at a time
//! to completion, in queue order; a blocking item (a modal prompt) delays
//! everything behind it, which is the host's own execution model for
//! dialogs.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::confirm;
use crate::error::BridgeError;
use crate::host::Host;
use crate::protocol::{CommandEnvelope, InnerCommand};
use crate::trust::TrustStore;

pub(crate) const ERROR_DIALOG_TITLE: &str = "drawbridge error";

/// Unit of work funneled onto the host thread.
#[derive(Debug)]
pub enum WorkItem {
    /// Execute an authenticated, accepted command.
    RunCommand(InnerCommand),
    /// First contact: ask the operator to confirm the caller's key.
    VerifyCommand(CommandEnvelope),
    /// Show an error dialog to the operator.
    ShowError(String),
}

/// Cloneable producer handle. Enqueueing never blocks and is safe from any
/// thread.
#[derive(Clone)]
pub struct Dispatcher {
    queue: mpsc::UnboundedSender<WorkItem>,
}

impl Dispatcher {
    pub fn enqueue(&self, item: WorkItem) -> Result<(), BridgeError> {
        self.queue.send(item).map_err(|err| BridgeError::DispatchFailure {
            detail: format!("main loop is gone: {err}"),
        })
    }

    /// Fatal-path convenience: surface a message to the operator.
    pub fn show_error(&self, text: impl Into<String>) {
        if let Err(err) = self.enqueue(WorkItem::ShowError(text.into())) {
            error!("failed to enqueue error dialog: {err}");
        }
    }
}

/// The single consumer, owned by the embedder and driven on the host
/// thread. Work item failures are caught and logged here; nothing that
/// happens inside an item may take the loop down.
pub struct MainLoop {
    queue: mpsc::UnboundedReceiver<WorkItem>,
    trust: Arc<TrustStore>,
}

pub(crate) fn channel(trust: Arc<TrustStore>) -> (Dispatcher, MainLoop) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Dispatcher { queue: tx }, MainLoop { queue: rx, trust })
}

impl MainLoop {
    /// Run until every producer handle is dropped, i.e. until the bridge is
    /// stopped. Call from the host's own thread, never from inside an async
    /// context.
    pub fn run(&mut self, host: &mut dyn Host) {
        while let Some(item) = self.queue.blocking_recv() {
            self.execute(item, host);
        }
        debug!("dispatch queue closed, main loop exiting");
    }

    /// Process currently queued items without blocking, for hosts that pump
    /// from an idle callback instead of parking a thread in `run`.
    pub fn drain(&mut self, host: &mut dyn Host) {
        while let Ok(item) = self.queue.try_recv() {
            self.execute(item, host);
        }
    }

    fn execute(&mut self, item: WorkItem, host: &mut dyn Host) {
        match item {
            WorkItem::RunCommand(command) => run_command(command, host),
            WorkItem::VerifyCommand(envelope) => {
                // A confirmed first-contact command runs as the
                // continuation of this item, ahead of anything queued
                // behind the prompt.
                match confirm::confirm_first_contact(&envelope, &self.trust, host) {
                    Ok(command) => run_command(command, host),
                    Err(err) => info!("first-contact request dropped: {err}"),
                }
            }
            WorkItem::ShowError(text) => host.show_message(&text, ERROR_DIALOG_TITLE),
        }
    }
}

/// Attach the debugger if requested, then run the script if provided,
/// detaching afterwards only when both were asked for.
fn run_command(command: InnerCommand, host: &mut dyn Host) {
    if command.is_noop() {
        warn!("no script provided and debugging not requested, nothing to do");
        return;
    }

    let detach = command.script.is_some() && command.debug_requested();

    if command.debug_requested() {
        match command.debug_port {
            Some(port) => {
                debug!(port, "attaching debugger");
                if let Err(err) = host.attach_debugger(port, Path::new(&command.pydevd_path)) {
                    error!("error while starting debugger: {err:#}");
                    host.show_message(
                        &format!("An error occurred while starting the debugger.\n\n{err:#}"),
                        ERROR_DIALOG_TITLE,
                    );
                }
            }
            None => {
                error!("debugging requested without a debug_port");
                host.show_message(
                    "Debugging was requested without a port to attach to.",
                    ERROR_DIALOG_TITLE,
                );
            }
        }
    }

    if let Some(script) = &command.script {
        let path = Path::new(script);
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        debug!(script = %path.display(), "running script");
        if let Err(err) = host.run_script(&path) {
            error!("unhandled error while running script: {err:#}");
            host.show_message(
                &format!("An error occurred while running the script.\n\n{err:#}"),
                ERROR_DIALOG_TITLE,
            );
        }
    }

    if detach {
        debug!("detaching debugger");
        if let Err(err) = host.detach_debugger() {
            error!("error while detaching debugger: {err:#}");
        }
    }
}
