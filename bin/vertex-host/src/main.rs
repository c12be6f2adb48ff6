//! Vertex host - process entry point for skein vertex stages.
//!
//! The cluster's worker daemon launches one host process per vertex, with
//! the vertex working directory as its current directory and the stage
//! module shipped one level above. The host wires up the channel layer and
//! the process-wide error reporter, then hands control to the entry bridge.

use anyhow::{Context, Result};
use clap::Parser;
use skein_vertex::{EntryRegistry, ErrorReporter, FileChannelLayer, VertexBridge};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Skein vertex host - runs one stage of a distributed graph.
#[derive(Debug, Parser)]
#[command(name = "vertex-host")]
struct Args {
    /// Bridge argument string: module,type,method,channel-descriptor.
    bridge_args: String,

    /// Error-code convention: 0 makes stage failures fatal to the process,
    /// any other value suppresses them and becomes the exit status.
    #[arg(long, default_value_t = 0)]
    error_code: i32,

    /// Working directory for this vertex.
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Input channel files, in port order.
    #[arg(long = "input")]
    inputs: Vec<PathBuf>,

    /// Output channel files, in port order.
    #[arg(long = "output")]
    outputs: Vec<PathBuf>,

    /// Identifier of this vertex within the job.
    #[arg(long, default_value_t = 0)]
    vertex_id: i64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();

    if let Some(workdir) = &args.workdir {
        std::env::set_current_dir(workdir)
            .with_context(|| format!("failed to enter workdir {}", workdir.display()))?;
    }

    info!(
        inputs = args.inputs.len(),
        outputs = args.outputs.len(),
        vertex_id = args.vertex_id,
        "starting vertex host"
    );

    let channels = Arc::new(FileChannelLayer::new(
        args.inputs,
        args.outputs,
        args.vertex_id,
    ));
    let reporter = Arc::new(ErrorReporter::new(args.error_code));
    let bridge = VertexBridge::new(
        Arc::new(EntryRegistry::new()),
        channels,
        reporter.clone(),
    );

    if let Err(e) = bridge.run(&args.bridge_args) {
        error!(error = %e, "vertex failed");
        return Err(e).context("vertex execution failed");
    }

    // a suppressed failure still has to be visible to the worker daemon
    if reporter.has_reported() {
        info!(code = reporter.error_code(), "vertex failed, exiting with configured code");
        std::process::exit(reporter.error_code());
    }

    info!("vertex completed");
    Ok(())
}
