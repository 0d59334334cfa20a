//! Drawbridge CLI - the caller side of the bridge protocol
//!
//! Generates the caller keypair, discovers running host instances over
//! multicast, and submits signed run commands to an instance's command
//! channel. On first contact the target instance asks its operator to
//! confirm the key digest this tool prints.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod client;

#[derive(Parser)]
#[command(
    name = "drawbridge",
    about = "Discover host instances and run scripts in them over the authenticated bridge",
    version
)]
struct Cli {
    /// Log filter, e.g. "debug" or "drawbridge=trace"
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the caller keypair and print its confirmation digest
    Keygen {
        /// Where to write the private key (PKCS#8 PEM)
        #[arg(long, default_value = "drawbridge_key.pem")]
        out: PathBuf,

        /// RSA key size in bits
        #[arg(long, default_value_t = 2048)]
        bits: usize,
    },

    /// Find running host instances via multicast search
    Discover {
        /// Only report the instance with this pid
        #[arg(long)]
        pid: Option<u32>,

        /// How long to wait for responses, in milliseconds
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },

    /// Sign and submit a run command to an instance
    Run {
        /// Private key written by `keygen`
        #[arg(long, default_value = "drawbridge_key.pem")]
        key: PathBuf,

        /// Command port of the target instance (from `discover`)
        #[arg(long)]
        port: u16,

        /// Script path the host should run
        #[arg(long)]
        script: Option<PathBuf>,

        /// Ask the host to attach a debugger back to this local port
        #[arg(long)]
        debug_port: Option<u16>,

        /// Debugger distribution path the host should load
        #[arg(long, default_value = "")]
        pydevd_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref());

    match cli.command {
        Command::Keygen { out, bits } => client::keygen(&out, bits),
        Command::Discover { pid, timeout_ms } => client::discover(pid, timeout_ms).await,
        Command::Run {
            key,
            port,
            script,
            debug_port,
            pydevd_path,
        } => client::run(&key, port, script.as_deref(), debug_port, &pydevd_path).await,
    }
}

fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
