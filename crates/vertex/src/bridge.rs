//! Native entry bridge.
//!
//! The worker host does not invoke generated stage code directly; it hands
//! this bridge a four-field argument string naming the stage module, the
//! entry's type and method, and the native channel descriptor. The bridge
//! resolves the entry through an explicit registration table (populated by
//! the loaded stage module), invokes it, and funnels every failure through
//! the process-wide reporter so the controlling system always sees the
//! original stage failure, never an opaque wrapper.

use crate::channels::ChannelLayer;
use crate::loader::StageModuleCache;
use crate::report::{stage_failure, ErrorReporter, StageFailure};
use crate::{Result, VertexError};
use dashmap::DashMap;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Parsed bridge argument string.
#[derive(Debug, Clone)]
pub struct BridgeArgs {
    /// File name of the stage module shipped with the job.
    pub module: String,
    /// Type that carries the entry method.
    pub type_name: String,
    /// Public entry method name.
    pub method: String,
    /// Native channel descriptor, passed through to the entry untouched.
    pub channel_args: String,
}

impl BridgeArgs {
    /// Parse the comma-separated four-field bridge argument string.
    pub fn parse(raw: &str) -> Result<Self> {
        let fields: Vec<&str> = raw.split(',').collect();
        if fields.len() != 4 {
            return Err(VertexError::BadBridgeArgs(fields.len()));
        }
        Ok(Self {
            module: fields[0].to_string(),
            type_name: fields[1].to_string(),
            method: fields[2].to_string(),
            channel_args: fields[3].to_string(),
        })
    }

    /// Resolved module location.
    ///
    /// The stage module ships with the job one level above each per-vertex
    /// working directory.
    pub fn module_path(&self) -> PathBuf {
        Path::new("..").join(&self.module)
    }
}

/// Everything a stage entry needs from the hosting process.
///
/// Stage code and the bridge share the one reporter instance, which is what
/// makes identity-based report deduplication effective across the
/// report-then-return double-report pattern.
pub struct HostContext {
    pub channels: Arc<dyn ChannelLayer>,
    pub reporter: Arc<ErrorReporter>,
}

/// Signature of a registered stage entry point. The second argument is the
/// native channel descriptor.
pub type VertexEntryFn =
    fn(&HostContext, &str) -> std::result::Result<(), StageFailure>;

/// Explicit entry-point lookup table, keyed `Type::method`.
///
/// Populated by the stage build step: the loaded stage module registers its
/// entries through this table instead of the host resolving symbols by
/// name.
#[derive(Default)]
pub struct EntryRegistry {
    entries: DashMap<String, VertexEntryFn>,
}

impl EntryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(type_name: &str, method: &str) -> String {
        format!("{}::{}", type_name, method)
    }

    /// Register one entry point.
    pub fn register(&self, type_name: &str, method: &str, entry: VertexEntryFn) {
        self.entries.insert(Self::key(type_name, method), entry);
    }

    /// Look up a registered entry point.
    pub fn resolve(&self, type_name: &str, method: &str) -> Option<VertexEntryFn> {
        self.entries.get(&Self::key(type_name, method)).map(|e| *e)
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The process entry point invoked by the worker host.
pub struct VertexBridge {
    registry: Arc<EntryRegistry>,
    modules: StageModuleCache,
    channels: Arc<dyn ChannelLayer>,
    reporter: Arc<ErrorReporter>,
}

impl VertexBridge {
    pub fn new(
        registry: Arc<EntryRegistry>,
        channels: Arc<dyn ChannelLayer>,
        reporter: Arc<ErrorReporter>,
    ) -> Self {
        Self {
            registry,
            modules: StageModuleCache::new(),
            channels,
            reporter,
        }
    }

    /// Resolve and invoke the stage entry named by the raw bridge argument
    /// string.
    ///
    /// Every failure - argument parsing, module loading, a failure returned
    /// by the entry, or a panic inside it - is reported through the shared
    /// reporter. Whether the failure then propagates or is suppressed
    /// follows the reporter's error-code convention.
    pub fn run(&self, raw: &str) -> Result<()> {
        match self.invoke(raw) {
            Ok(()) => Ok(()),
            Err(failure) => self.reporter.report(&failure),
        }
    }

    fn invoke(&self, raw: &str) -> std::result::Result<(), StageFailure> {
        let args = BridgeArgs::parse(raw).map_err(stage_failure)?;
        let entry = self.resolve_entry(&args).map_err(stage_failure)?;

        info!(
            module = %args.module,
            entry = %format!("{}::{}", args.type_name, args.method),
            "invoking vertex entry"
        );

        let ctx = HostContext {
            channels: self.channels.clone(),
            reporter: self.reporter.clone(),
        };

        match catch_unwind(AssertUnwindSafe(|| entry(&ctx, &args.channel_args))) {
            Ok(result) => result,
            // a panic is the invocation wrapper; report its payload, not
            // the wrapper
            Err(payload) => Err(stage_failure(anyhow::anyhow!(
                "vertex entry panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }

    fn resolve_entry(&self, args: &BridgeArgs) -> Result<VertexEntryFn> {
        if let Some(entry) = self.registry.resolve(&args.type_name, &args.method) {
            return Ok(entry);
        }

        self.modules
            .get_or_load(&args.module_path(), &self.registry)?;

        self.registry
            .resolve(&args.type_name, &args.method)
            .ok_or_else(|| VertexError::EntryNotFound {
                module: args.module.clone(),
                type_name: args.type_name.clone(),
                method: args.method.clone(),
            })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::FileChannelLayer;
    use crate::report::VERTEX_EXCEPTION_FILENAME;
    use std::sync::OnceLock;

    fn host_channels() -> Arc<dyn ChannelLayer> {
        Arc::new(FileChannelLayer::new(vec![], vec![], 0))
    }

    fn bridge_with(
        reporter: Arc<ErrorReporter>,
        entries: &[(&str, &str, VertexEntryFn)],
    ) -> VertexBridge {
        let registry = Arc::new(EntryRegistry::new());
        for (type_name, method, entry) in entries {
            registry.register(type_name, method, *entry);
        }
        VertexBridge::new(registry, host_channels(), reporter)
    }

    fn ok_entry(_ctx: &HostContext, _args: &str) -> std::result::Result<(), StageFailure> {
        Ok(())
    }

    fn panicking_entry(_ctx: &HostContext, _args: &str) -> std::result::Result<(), StageFailure> {
        panic!("stage exploded");
    }

    static SHARED_FAILURE: OnceLock<StageFailure> = OnceLock::new();

    /// Mimics generated stage code: report the failure, then return the
    /// same object so the bridge reports it again.
    fn double_reporting_entry(
        ctx: &HostContext,
        _args: &str,
    ) -> std::result::Result<(), StageFailure> {
        let failure = SHARED_FAILURE
            .get_or_init(|| stage_failure(anyhow::anyhow!("inner stage failure")))
            .clone();
        if ctx.reporter.report(&failure).is_err() {
            panic!("suppressing reporter propagated");
        }
        Err(failure)
    }

    #[test]
    fn test_parse_requires_four_fields() {
        assert!(matches!(
            BridgeArgs::parse("module.so,MyType,run"),
            Err(VertexError::BadBridgeArgs(3))
        ));

        let args = BridgeArgs::parse("module.so,MyType,run,1f40|rest").unwrap();
        assert_eq!(args.module, "module.so");
        assert_eq!(args.type_name, "MyType");
        assert_eq!(args.method, "run");
        assert_eq!(args.channel_args, "1f40|rest");
        assert_eq!(args.module_path(), Path::new("..").join("module.so"));
    }

    #[test]
    fn test_successful_entry_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = Arc::new(ErrorReporter::with_work_dir(1, dir.path()));
        let bridge = bridge_with(reporter.clone(), &[("MyType", "run", ok_entry)]);

        bridge.run("module.so,MyType,run,0|args").unwrap();
        assert!(!reporter.has_reported());
    }

    #[test]
    fn test_double_report_writes_artifact_once() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = Arc::new(ErrorReporter::with_work_dir(3, dir.path()));
        let bridge = bridge_with(reporter.clone(), &[("MyType", "run", double_reporting_entry)]);

        // error code 3: the failure is suppressed, not propagated
        bridge.run("module.so,MyType,run,0|args").unwrap();

        let artifact = dir.path().join(VERTEX_EXCEPTION_FILENAME);
        let contents = std::fs::read_to_string(&artifact).unwrap();
        assert!(contents.contains("inner stage failure"));

        // the bridge's second report of the same object was a no-op
        std::fs::remove_file(&artifact).unwrap();
        assert!(reporter.has_reported());
    }

    #[test]
    fn test_panic_is_normalized_to_its_payload() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = Arc::new(ErrorReporter::with_work_dir(0, dir.path()));
        let bridge = bridge_with(reporter, &[("MyType", "run", panicking_entry)]);

        let err = bridge.run("module.so,MyType,run,0|args").unwrap_err();
        match err {
            VertexError::Stage(failure) => {
                assert!(failure.to_string().contains("stage exploded"));
            }
            other => panic!("expected Stage, got {:?}", other),
        }
        assert!(dir.path().join(VERTEX_EXCEPTION_FILENAME).exists());
    }

    #[test]
    fn test_missing_module_failure_is_reported_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = Arc::new(ErrorReporter::with_work_dir(0, dir.path()));
        let bridge = bridge_with(reporter, &[]);

        let err = bridge
            .run("no-such-module.so,MyType,run,0|args")
            .unwrap_err();
        assert!(matches!(err, VertexError::Stage(_)));
        assert!(dir.path().join(VERTEX_EXCEPTION_FILENAME).exists());
    }

    #[test]
    fn test_registry_resolution() {
        let registry = EntryRegistry::new();
        assert!(registry.is_empty());

        registry.register("MyType", "run", ok_entry);
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve("MyType", "run").is_some());
        assert!(registry.resolve("MyType", "other").is_none());
    }
}
