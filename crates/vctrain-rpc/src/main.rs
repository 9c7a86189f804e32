//! vctrain RPC server - JSON-RPC backend for the training control panel.
//!
//! Wraps `vctrain-core` in a JSON-RPC 2.0 server. The bound port is printed
//! to stdout as `RPC_PORT=<port>` so a parent process can connect.

mod handlers;
mod server;
mod wrapper;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "vctrain-rpc")]
#[command(about = "JSON-RPC server for a voice-conversion training workspace")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Workspace root directory (defaults to the current directory)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Interpreter used to run the trainer entry point
    #[arg(long)]
    python: Option<String>,

    /// Trainer entry point, relative to the workspace root
    #[arg(long)]
    core_script: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    info!("Starting vctrain RPC server");

    let root = match args.root {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    info!("Workspace root: {}", root.display());

    let mut builder = vctrain_core::TrainerApi::builder(&root).auto_create_dirs(true);
    if let Some(python) = args.python {
        builder = builder.interpreter(python);
    }
    if let Some(script) = args.core_script {
        builder = builder.core_script(script);
    }
    let api = builder.build().await?;

    let addr = server::start_server(api, &args.host, args.port).await?;

    // Intentional stdout: the parent process reads the port from here
    println!("RPC_PORT={}", addr.port());

    info!("RPC server running on {}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
