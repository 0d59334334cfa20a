//! Bridge lifecycle
//!
//! `Bridge::start` owns a small tokio runtime running the two listener
//! tasks and hands the embedder back the `MainLoop` to drive from the
//! host's single thread. Listener failures are logged and surfaced to the
//! operator; they never propagate into the host. `stop` shuts the runtime
//! down in the background — in-flight requests then fail with connection
//! errors, which is acceptable.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;
use tracing::{debug, error, info};

use crate::config::BridgeConfig;
use crate::discovery::DiscoveryResponder;
use crate::dispatch::{self, Dispatcher, MainLoop};
use crate::server::{self, ListenerState};
use crate::trust::TrustStore;

pub struct Bridge {
    runtime: Runtime,
    dispatcher: Dispatcher,
    command_port: u16,
    discovery_port: u16,
}

impl Bridge {
    /// Bind both listeners and spawn their tasks. Returns the bridge handle
    /// and the main loop the host thread must drive. Call from a plain
    /// thread, not from inside an async context.
    pub fn start(config: BridgeConfig) -> Result<(Bridge, MainLoop)> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .context("failed to build bridge runtime")?;

        let trust = Arc::new(TrustStore::new());
        let (dispatcher, main_loop) = dispatch::channel(Arc::clone(&trust));

        let listener = runtime
            .block_on(server::bind())
            .context("failed to bind command listener")?;
        let command_port = listener
            .local_addr()
            .context("command listener has no local address")?
            .port();

        let responder = runtime
            .block_on(async { DiscoveryResponder::bind(&config, command_port) })
            .context("failed to bind discovery responder")?;
        let discovery_port = responder
            .local_port()
            .context("discovery responder has no local address")?;

        let state = Arc::new(ListenerState {
            trust,
            dispatcher: dispatcher.clone(),
        });

        {
            let dispatcher = dispatcher.clone();
            runtime.spawn(async move {
                if let Err(err) = server::serve(listener, state).await {
                    error!("command listener terminated: {err}");
                    dispatcher
                        .show_error(format!("The command listener stopped unexpectedly.\n\n{err}"));
                }
            });
        }

        runtime.spawn(responder.serve());

        info!(command_port, discovery_port, "bridge started");
        Ok((
            Bridge {
                runtime,
                dispatcher,
                command_port,
                discovery_port,
            },
            main_loop,
        ))
    }

    /// Port the command listener is bound to; discovery responses carry it.
    pub fn command_port(&self) -> u16 {
        self.command_port
    }

    /// Port the discovery responder is bound to (the configured one, unless
    /// 0 was requested).
    pub fn discovery_port(&self) -> u16 {
        self.discovery_port
    }

    /// Producer handle, for embedders that want to surface their own
    /// dialogs through the same queue.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Shut both listeners down. Work already handed to the main loop still
    /// runs; the loop itself exits once this handle is gone.
    pub fn stop(self) {
        debug!("stopping bridge");
        self.runtime.shutdown_background();
    }
}
