//! Vertex execution environment.
//!
//! Encapsulates the external environment in which one stage of a
//! distributed graph executes: the native execution handle, the physical
//! channel counts, the port-negotiation cursors and the write-buffer
//! sizing. Exactly one environment exists per worker process, constructed
//! by the stage's generated entry code before any data-processing threads
//! start.

use crate::channels::{
    ChannelLayer, NativeHandle, PortAssignment, VertexReader, VertexWriter,
};
use crate::params::{RemoteArch, VertexParams};
use crate::{Result, VertexError};
use std::sync::Arc;
use tracing::debug;

/// Total input size assumed when any channel reports an unknown length.
const UNKNOWN_INPUT_FALLBACK: u64 = 5 * 1024 * 1024 * 1024;

/// Per-process execution context of one vertex stage.
pub struct VertexEnv {
    channels: Arc<dyn ChannelLayer>,
    handle: NativeHandle,
    args: Vec<String>,
    params: VertexParams,
    inputs: u32,
    outputs: u32,
    next_input_port: u32,
    next_output_port: u32,
    write_buffer_size: u64,
}

impl std::fmt::Debug for VertexEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexEnv")
            .field("handle", &self.handle)
            .field("args", &self.args)
            .field("params", &self.params)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("next_input_port", &self.next_input_port)
            .field("next_output_port", &self.next_output_port)
            .field("write_buffer_size", &self.write_buffer_size)
            .finish_non_exhaustive()
    }
}

impl VertexEnv {
    /// Construct the environment from the serialized vertex argument
    /// string and the stage's declared parameters.
    ///
    /// The argument string is `|`-separated; its first field is the native
    /// execution handle in hexadecimal. Construction queries the channel
    /// layer for the physical channel counts, fails if the declared arity
    /// exceeds them (a mismatched stage descriptor), and - when outputs
    /// exist - publishes the initial write-size hint for every output
    /// channel.
    pub fn from_args(
        args: &str,
        params: VertexParams,
        channels: Arc<dyn ChannelLayer>,
    ) -> Result<Self> {
        let arg_list: Vec<String> = args.split('|').map(str::to_string).collect();
        let first = arg_list
            .first()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| VertexError::BadArgs("missing native handle field".to_string()))?;
        let handle = NativeHandle::from_hex(first)?;

        let inputs = channels.input_count(handle);
        let outputs = channels.output_count(handle);

        if params.input_arity > inputs {
            return Err(VertexError::ArityMismatch {
                direction: "input",
                declared: params.input_arity,
                physical: inputs,
            });
        }
        if params.output_arity > outputs {
            return Err(VertexError::ArityMismatch {
                direction: "output",
                declared: params.output_arity,
                physical: outputs,
            });
        }

        let write_buffer_size = write_buffer_size(
            params.use_large_buffer,
            channels.physical_memory(),
            outputs,
            params.remote_arch,
        );

        let env = Self {
            channels,
            handle,
            args: arg_list,
            params,
            inputs,
            outputs,
            next_input_port: 0,
            next_output_port: 0,
            write_buffer_size,
        };

        debug!(
            inputs,
            outputs,
            buffer = env.write_buffer_size,
            "vertex environment constructed"
        );

        if env.outputs > 0 {
            env.set_initial_write_size_hint();
        }
        Ok(env)
    }

    /// Physical input channel count (authoritative upper bound).
    pub fn inputs(&self) -> u32 {
        self.inputs
    }

    /// Physical output channel count (authoritative upper bound).
    pub fn outputs(&self) -> u32 {
        self.outputs
    }

    /// Identifier of this vertex within the job.
    pub fn vertex_id(&self) -> i64 {
        self.channels.vertex_id(self.handle)
    }

    /// Number of fields in the vertex argument string.
    pub fn argument_count(&self) -> usize {
        self.args.len()
    }

    /// One field of the vertex argument string.
    pub fn argument(&self, idx: usize) -> Option<&str> {
        self.args.get(idx).map(String::as_str)
    }

    /// Whether the stage declared multithreaded channel processing.
    pub fn multi_threading(&self) -> bool {
        self.params.multi_threading
    }

    /// Write-buffer capacity computed at construction.
    pub fn write_buffer_size(&self) -> u64 {
        self.write_buffer_size
    }

    /// Claim the next input endpoint.
    ///
    /// While more declared endpoints remain than the cursor has issued,
    /// each call claims one exclusive port. The final declared call claims
    /// every remaining physical channel as one aggregated endpoint, so
    /// stage code never needs to know the exact physical fan-in.
    pub fn make_reader(&mut self) -> VertexReader {
        let ports = if self.next_input_port + 1 < self.params.input_arity {
            let port = self.next_input_port;
            self.next_input_port += 1;
            PortAssignment::Single(port)
        } else {
            PortAssignment::Range {
                start: self.next_input_port,
                end: self.inputs,
            }
        };
        VertexReader {
            handle: self.handle,
            ports,
            keep_port_order: self.params.keep_input_port_order,
        }
    }

    /// Claim the next output endpoint; same negotiation as
    /// [`make_reader`](VertexEnv::make_reader).
    pub fn make_writer(&mut self) -> VertexWriter {
        let ports = if self.next_output_port + 1 < self.params.output_arity {
            let port = self.next_output_port;
            self.next_output_port += 1;
            PortAssignment::Single(port)
        } else {
            PortAssignment::Range {
                start: self.next_output_port,
                end: self.outputs,
            }
        };
        VertexWriter {
            handle: self.handle,
            ports,
            buffer_size: self.write_buffer_size,
        }
    }

    /// Total expected input bytes, `None` if any channel is unknown.
    fn input_size(&self) -> Option<u64> {
        let mut total = 0u64;
        for port in 0..self.inputs {
            total += self.channels.expected_length(self.handle, port)?;
        }
        Some(total)
    }

    /// Publish the initial write-size hint for every output channel, so
    /// the native layer can pre-size its buffers before the first byte is
    /// written.
    fn set_initial_write_size_hint(&self) {
        let total = self.input_size().unwrap_or(UNKNOWN_INPUT_FALLBACK);
        let per_channel = total / self.outputs as u64;
        for port in 0..self.outputs {
            self.channels
                .set_initial_size_hint(self.handle, port, per_channel);
        }
    }
}

/// Write-buffer capacity for one output endpoint.
///
/// Deterministic in its inputs: baseline 256 MiB in large-buffer mode,
/// 1 MiB otherwise; capped by a quarter of physical memory (512 MiB when
/// the memory query fails), by 1 GiB on 32-bit targets, and divided across
/// output channels; floored at 8 KiB.
pub fn write_buffer_size(
    use_large_buffer: bool,
    physical_memory: Option<u64>,
    output_channels: u32,
    remote_arch: RemoteArch,
) -> u64 {
    const MIB: u64 = 1024 * 1024;
    const MIN_BUFFER: u64 = 8 * 1024;

    let mut cap = physical_memory.map(|m| m / 4).unwrap_or(512 * MIB);
    if remote_arch.is_32bit() {
        cap = cap.min(1024 * MIB);
    }
    if output_channels > 0 {
        cap /= output_channels as u64;
    }

    let baseline = if use_large_buffer { 256 * MIB } else { MIB };
    baseline.min(cap).max(MIN_BUFFER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Channel layer stub with fixed counts and lengths.
    struct TestChannels {
        inputs: Vec<Option<u64>>,
        outputs: u32,
        memory: Option<u64>,
        hints: Mutex<HashMap<u32, u64>>,
    }

    impl TestChannels {
        fn new(inputs: Vec<Option<u64>>, outputs: u32) -> Arc<Self> {
            Arc::new(Self {
                inputs,
                outputs,
                memory: Some(4 * 1024 * 1024 * 1024),
                hints: Mutex::new(HashMap::new()),
            })
        }
    }

    impl ChannelLayer for TestChannels {
        fn input_count(&self, _handle: NativeHandle) -> u32 {
            self.inputs.len() as u32
        }

        fn output_count(&self, _handle: NativeHandle) -> u32 {
            self.outputs
        }

        fn vertex_id(&self, _handle: NativeHandle) -> i64 {
            42
        }

        fn expected_length(&self, _handle: NativeHandle, port: u32) -> Option<u64> {
            self.inputs.get(port as usize).copied().flatten()
        }

        fn set_initial_size_hint(&self, _handle: NativeHandle, port: u32, bytes: u64) {
            self.hints.lock().insert(port, bytes);
        }

        fn physical_memory(&self) -> Option<u64> {
            self.memory
        }
    }

    const GIB: u64 = 1024 * 1024 * 1024;
    const MIB: u64 = 1024 * 1024;

    #[test]
    fn test_buffer_size_large_mode_capped_by_memory_share() {
        // min(256 MiB, 2 GiB / 4 / 4 outputs, 1 GiB) = 128 MiB
        let size = write_buffer_size(true, Some(2 * GIB), 4, RemoteArch::I386);
        assert_eq!(size, 128 * MIB);
    }

    #[test]
    fn test_buffer_size_small_mode_with_unknown_memory() {
        // min(1 MiB, 512 MiB fallback) = 1 MiB
        let size = write_buffer_size(false, None, 0, RemoteArch::Amd64);
        assert_eq!(size, MIB);
    }

    #[test]
    fn test_buffer_size_floors_at_8_kib() {
        let size = write_buffer_size(false, Some(16 * 1024), 1, RemoteArch::Amd64);
        assert_eq!(size, 8 * 1024);
    }

    #[test]
    fn test_buffer_size_32bit_cap_applies_to_large_memory() {
        // 16 GiB / 4 = 4 GiB, capped at 1 GiB, divided by 2 outputs
        let size = write_buffer_size(true, Some(16 * GIB), 2, RemoteArch::I386);
        assert_eq!(size, 256 * MIB);
    }

    #[test]
    fn test_port_negotiation_folds_extra_channels_into_final_reader() {
        let channels = TestChannels::new(vec![Some(1); 5], 0);
        let mut env = VertexEnv::from_args("0", VertexParams::new(2, 0), channels).unwrap();

        assert_eq!(env.make_reader().ports, PortAssignment::Single(0));
        assert_eq!(
            env.make_reader().ports,
            PortAssignment::Range { start: 1, end: 5 }
        );
    }

    #[test]
    fn test_single_reader_claims_whole_range() {
        let channels = TestChannels::new(vec![Some(1); 3], 0);
        let mut env = VertexEnv::from_args("0", VertexParams::new(1, 0), channels).unwrap();

        assert_eq!(
            env.make_reader().ports,
            PortAssignment::Range { start: 0, end: 3 }
        );
    }

    #[test]
    fn test_writer_negotiation_mirrors_reader() {
        let channels = TestChannels::new(vec![Some(1)], 4);
        let mut env = VertexEnv::from_args("0", VertexParams::new(1, 3), channels).unwrap();

        assert_eq!(env.make_writer().ports, PortAssignment::Single(0));
        assert_eq!(env.make_writer().ports, PortAssignment::Single(1));
        assert_eq!(
            env.make_writer().ports,
            PortAssignment::Range { start: 2, end: 4 }
        );
    }

    #[test]
    fn test_construction_rejects_arity_above_physical_channels() {
        let channels = TestChannels::new(vec![Some(1); 2], 0);
        let err = VertexEnv::from_args("0", VertexParams::new(3, 0), channels).unwrap_err();
        assert!(matches!(
            err,
            VertexError::ArityMismatch {
                direction: "input",
                declared: 3,
                physical: 2,
            }
        ));
    }

    #[test]
    fn test_initial_size_hint_divides_known_input_evenly() {
        let channels = TestChannels::new(vec![Some(600), Some(400)], 4);
        VertexEnv::from_args("0", VertexParams::new(2, 4), channels.clone()).unwrap();

        let hints = channels.hints.lock();
        assert_eq!(hints.len(), 4);
        assert!(hints.values().all(|&bytes| bytes == 250));
    }

    #[test]
    fn test_initial_size_hint_falls_back_when_length_unknown() {
        let channels = TestChannels::new(vec![Some(600), None], 2);
        VertexEnv::from_args("0", VertexParams::new(2, 2), channels.clone()).unwrap();

        let expected = UNKNOWN_INPUT_FALLBACK / 2;
        assert_eq!(channels.hints.lock().get(&0), Some(&expected));
    }

    #[test]
    fn test_no_hint_published_without_outputs() {
        let channels = TestChannels::new(vec![Some(1)], 0);
        VertexEnv::from_args("0", VertexParams::new(1, 0), channels.clone()).unwrap();
        assert!(channels.hints.lock().is_empty());
    }

    #[test]
    fn test_argument_fields_are_preserved() {
        let channels = TestChannels::new(vec![Some(1)], 0);
        let env =
            VertexEnv::from_args("1f40|stage-3|extra", VertexParams::new(1, 0), channels).unwrap();

        assert_eq!(env.argument_count(), 3);
        assert_eq!(env.argument(1), Some("stage-3"));
        assert_eq!(env.vertex_id(), 42);
    }

    #[test]
    fn test_bad_handle_is_rejected() {
        let channels = TestChannels::new(vec![], 0);
        assert!(matches!(
            VertexEnv::from_args("xyz|rest", VertexParams::new(0, 0), channels),
            Err(VertexError::BadHandle(_))
        ));
    }
}
