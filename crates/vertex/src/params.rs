//! Stage parameter descriptor.
//!
//! Generated stage code constructs a [`VertexParams`] describing the arity
//! and execution mode it was compiled for; the vertex environment checks it
//! against the physical channels the worker host actually provides.

use serde::{Deserialize, Serialize};

/// Target architecture of the remote worker processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteArch {
    /// 32-bit x86 workers; address space caps buffer sizing.
    I386,
    /// 64-bit workers.
    Amd64,
}

impl RemoteArch {
    pub fn is_32bit(self) -> bool {
        matches!(self, RemoteArch::I386)
    }
}

/// Declared execution parameters of one vertex stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexParams {
    /// Number of input endpoints the stage code will request.
    pub input_arity: u32,
    /// Number of output endpoints the stage code will request.
    pub output_arity: u32,
    /// Use the large (256 MiB) write-buffer baseline instead of 1 MiB.
    pub use_large_buffer: bool,
    /// Readers must preserve the physical port order when aggregating
    /// multiple channels into one endpoint.
    pub keep_input_port_order: bool,
    /// The stage processes channels from multiple threads once ports are
    /// assigned; the environment itself stays single-threaded either way.
    pub multi_threading: bool,
    /// Architecture of the remote workers this stage was compiled for.
    pub remote_arch: RemoteArch,
}

impl VertexParams {
    /// Create parameters for a stage with the given channel arity.
    pub fn new(input_arity: u32, output_arity: u32) -> Self {
        Self {
            input_arity,
            output_arity,
            use_large_buffer: false,
            keep_input_port_order: false,
            multi_threading: false,
            remote_arch: RemoteArch::Amd64,
        }
    }

    /// Use the large write-buffer baseline.
    pub fn with_large_buffer(mut self) -> Self {
        self.use_large_buffer = true;
        self
    }

    /// Require port order to be preserved across aggregated readers.
    pub fn with_input_port_order(mut self) -> Self {
        self.keep_input_port_order = true;
        self
    }

    /// Declare that the stage processes channels from multiple threads.
    pub fn with_multi_threading(mut self) -> Self {
        self.multi_threading = true;
        self
    }

    /// Set the remote worker architecture.
    pub fn with_remote_arch(mut self, arch: RemoteArch) -> Self {
        self.remote_arch = arch;
        self
    }
}
