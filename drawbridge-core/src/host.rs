//! Host application capability surface
//!
//! Everything the bridge needs from the embedding application, called only
//! from the main loop on the host's own thread. Implementations may block;
//! the dialog methods are expected to be modal.

use std::path::Path;

use anyhow::Result;

pub trait Host {
    /// Import (or re-import) and run the script at `path`.
    fn run_script(&mut self, path: &Path) -> Result<()>;

    /// Attach the debugger distribution at `pydevd_path` back to the
    /// caller's listener on `port`.
    fn attach_debugger(&mut self, port: u16, pydevd_path: &Path) -> Result<()>;

    /// Stop an attach started by `attach_debugger`.
    fn detach_debugger(&mut self) -> Result<()>;

    /// Modal input prompt. `None` means the operator cancelled.
    fn input_box(&mut self, prompt: &str, title: &str) -> Option<String>;

    /// Modal message dialog.
    fn show_message(&mut self, text: &str, title: &str);
}
