//! Native channel layer contract and port assignments.
//!
//! The worker host owns the physical data channels of a vertex process.
//! This module defines the narrow contract the runtime consumes from that
//! layer, keyed by an opaque execution handle, plus a file-backed
//! implementation used by the host binary and tests.

use crate::{Result, VertexError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;

/// Opaque native execution-context handle.
///
/// The worker host encodes it as the hexadecimal first field of the vertex
/// argument string; the runtime never interprets it beyond passing it back
/// to the channel layer. Exactly one environment owns a handle for the
/// process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub u64);

impl NativeHandle {
    /// Parse a handle from its hexadecimal wire form.
    pub fn from_hex(s: &str) -> Result<Self> {
        u64::from_str_radix(s, 16)
            .map(NativeHandle)
            .map_err(|_| VertexError::BadHandle(s.to_string()))
    }
}

/// The native worker-channel layer, as seen by the vertex runtime.
///
/// All calls take the execution handle explicitly; the layer holds no
/// implicit per-process context.
pub trait ChannelLayer: Send + Sync {
    /// Number of physical input channels available to this process.
    fn input_count(&self, handle: NativeHandle) -> u32;

    /// Number of physical output channels available to this process.
    fn output_count(&self, handle: NativeHandle) -> u32;

    /// Identifier of this vertex within the job.
    fn vertex_id(&self, handle: NativeHandle) -> i64;

    /// Expected byte length of one input channel, `None` when unknown.
    fn expected_length(&self, handle: NativeHandle, port: u32) -> Option<u64>;

    /// Pre-size the native buffer of one output channel.
    fn set_initial_size_hint(&self, handle: NativeHandle, port: u32, bytes: u64);

    /// Physical memory available to the process, `None` when the query
    /// fails.
    fn physical_memory(&self) -> Option<u64>;
}

/// Result of a reader/writer port request.
///
/// Either a single exclusive channel, or - for the last requested endpoint -
/// the whole remaining contiguous range, folding any physical channels
/// beyond the declared arity into one aggregated endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortAssignment {
    Single(u32),
    /// Half-open range `[start, end)`.
    Range { start: u32, end: u32 },
}

impl PortAssignment {
    /// Number of physical channels covered by this assignment.
    pub fn channel_count(&self) -> u32 {
        match *self {
            PortAssignment::Single(_) => 1,
            PortAssignment::Range { start, end } => end.saturating_sub(start),
        }
    }

    /// Iterate the physical ports covered by this assignment.
    pub fn ports(&self) -> impl Iterator<Item = u32> {
        match *self {
            PortAssignment::Single(port) => port..port + 1,
            PortAssignment::Range { start, end } => start..end,
        }
    }
}

/// A negotiated input endpoint of one vertex stage.
#[derive(Debug, Clone)]
pub struct VertexReader {
    pub handle: NativeHandle,
    pub ports: PortAssignment,
    /// Preserve physical port order when merging an aggregated range.
    pub keep_port_order: bool,
}

/// A negotiated output endpoint of one vertex stage.
#[derive(Debug, Clone)]
pub struct VertexWriter {
    pub handle: NativeHandle,
    pub ports: PortAssignment,
    /// Write-buffer capacity chosen at environment construction.
    pub buffer_size: u64,
}

/// File-backed channel layer used by the vertex host binary.
///
/// Each channel is one file; the expected length of an input channel is its
/// on-disk size. Size hints have no file analog and are recorded so the
/// host can surface them.
pub struct FileChannelLayer {
    inputs: Vec<PathBuf>,
    outputs: Vec<PathBuf>,
    vertex_id: i64,
    hints: Mutex<HashMap<u32, u64>>,
}

impl FileChannelLayer {
    pub fn new(inputs: Vec<PathBuf>, outputs: Vec<PathBuf>, vertex_id: i64) -> Self {
        Self {
            inputs,
            outputs,
            vertex_id,
            hints: Mutex::new(HashMap::new()),
        }
    }

    /// The last size hint recorded for an output channel.
    pub fn size_hint(&self, port: u32) -> Option<u64> {
        self.hints.lock().get(&port).copied()
    }
}

impl ChannelLayer for FileChannelLayer {
    fn input_count(&self, _handle: NativeHandle) -> u32 {
        self.inputs.len() as u32
    }

    fn output_count(&self, _handle: NativeHandle) -> u32 {
        self.outputs.len() as u32
    }

    fn vertex_id(&self, _handle: NativeHandle) -> i64 {
        self.vertex_id
    }

    fn expected_length(&self, _handle: NativeHandle, port: u32) -> Option<u64> {
        let path = self.inputs.get(port as usize)?;
        std::fs::metadata(path).ok().map(|m| m.len())
    }

    fn set_initial_size_hint(&self, _handle: NativeHandle, port: u32, bytes: u64) {
        self.hints.lock().insert(port, bytes);
    }

    fn physical_memory(&self) -> Option<u64> {
        let mut system = sysinfo::System::new();
        system.refresh_memory();
        let available = system.available_memory();
        if available == 0 {
            None
        } else {
            Some(available)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_parses_hex() {
        assert_eq!(NativeHandle::from_hex("1f40").unwrap(), NativeHandle(8000));
        assert!(NativeHandle::from_hex("not-hex").is_err());
        assert!(NativeHandle::from_hex("").is_err());
    }

    #[test]
    fn test_port_assignment_channel_counts() {
        assert_eq!(PortAssignment::Single(3).channel_count(), 1);
        assert_eq!(PortAssignment::Range { start: 1, end: 5 }.channel_count(), 4);
        let ports: Vec<u32> = PortAssignment::Range { start: 1, end: 4 }.ports().collect();
        assert_eq!(ports, vec![1, 2, 3]);
    }

    #[test]
    fn test_file_layer_reports_file_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("part-0");
        std::fs::write(&input, b"0123456789").unwrap();

        let layer = FileChannelLayer::new(vec![input, dir.path().join("missing")], vec![], 7);
        let handle = NativeHandle(0);

        assert_eq!(layer.input_count(handle), 2);
        assert_eq!(layer.expected_length(handle, 0), Some(10));
        assert_eq!(layer.expected_length(handle, 1), None);
        assert_eq!(layer.vertex_id(handle), 7);
    }
}
