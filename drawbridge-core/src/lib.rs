//! Drawbridge core library exports
//!
//! An embeddable bridge that lets a remote development environment run
//! scripts inside a single-threaded host application, gated by an
//! operator-confirmed trust-on-first-use ceremony. `bridge::Bridge` is the
//! entry point; the embedder supplies a `host::Host` implementation and
//! drives the returned `MainLoop` from the host's own thread.

pub mod bridge;
pub mod config;
mod confirm;
mod discovery;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod protocol;
mod server;
pub mod trust;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use dispatch::{Dispatcher, MainLoop, WorkItem};
pub use error::BridgeError;
pub use host::Host;
