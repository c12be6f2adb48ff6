//! Skein vertex runtime
//!
//! This crate is the execution context of one stage of a distributed
//! dataflow graph, running inside a cluster-dispatched worker process. It
//! covers three concerns:
//!
//! - negotiating how many physical input/output channels exist versus how
//!   many the stage's code expects ([`env::VertexEnv`]),
//! - computing safe write-buffer sizes from available memory
//!   ([`env::write_buffer_size`]),
//! - reporting stage failures exactly once back to the controlling system
//!   ([`report::ErrorReporter`]), including from the process entry point
//!   that resolves and invokes generated stage code
//!   ([`bridge::VertexBridge`]).

pub mod bridge;
pub mod channels;
pub mod env;
pub mod loader;
pub mod params;
pub mod report;

pub use bridge::{BridgeArgs, EntryRegistry, HostContext, VertexBridge, VertexEntryFn};
pub use channels::{
    ChannelLayer, FileChannelLayer, NativeHandle, PortAssignment, VertexReader, VertexWriter,
};
pub use env::{write_buffer_size, VertexEnv};
pub use loader::{StageModule, StageModuleCache};
pub use params::{RemoteArch, VertexParams};
pub use report::{stage_failure, ErrorReporter, StageFailure, VERTEX_EXCEPTION_FILENAME};

/// Result type for vertex runtime operations.
pub type Result<T> = std::result::Result<T, VertexError>;

/// Errors raised by the vertex runtime.
#[derive(Debug, thiserror::Error)]
pub enum VertexError {
    #[error("invalid vertex argument string: {0}")]
    BadArgs(String),

    #[error("invalid native handle '{0}'")]
    BadHandle(String),

    #[error("declared {direction} arity {declared} exceeds physical channel count {physical}")]
    ArityMismatch {
        direction: &'static str,
        declared: u32,
        physical: u32,
    },

    #[error("bridge argument string must have 4 fields, got {0}")]
    BadBridgeArgs(usize),

    #[error("failed to load stage module {path}: {source}")]
    ModuleLoad {
        path: String,
        #[source]
        source: libloading::Error,
    },

    #[error("no entry '{type_name}::{method}' registered by stage module '{module}'")]
    EntryNotFound {
        module: String,
        type_name: String,
        method: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("vertex failed: {0}")]
    Stage(StageFailure),
}
