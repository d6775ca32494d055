//! # RKH Trace
//!
//! Structured trace records emitted by the runtime, the runtime filter
//! tables that decide which of them reach a sink, and the narrow
//! [`TraceSink`] interface an external encoder plugs into.
//!
//! The wire format is not defined here; a sink receives typed
//! [`TraceRecord`] values and is free to frame them however its decoder
//! expects. [`LogSink`] forwards records to the `log` facade and
//! [`RecordingSink`] keeps them in memory for tests.

use std::sync::{Arc, Mutex};

use rkh_core::CsCell;
use thiserror::Error;

pub mod filter;
pub mod record;
pub mod records;

pub use filter::TraceFilter;
pub use record::TraceRecord;
pub use records::{TraceEventId, TraceGroup};

/// Errors a sink may report. They are logged, never propagated into the
/// framework.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("trace buffer full ({0} records)")]
    BufferFull(usize),
    #[error("backend error: {0}")]
    Backend(#[from] std::io::Error),
}

/// Consumer of trace records.
pub trait TraceSink: Send + Sync {
    fn record(&self, record: &TraceRecord) -> Result<(), TraceError>;
}

struct Inner {
    filter: CsCell<TraceFilter>,
    sink: Option<Arc<dyn TraceSink>>,
}

/// Cheap-to-clone handle shared by every subsystem that emits records.
///
/// All clones see the same filter tables.
#[derive(Clone)]
pub struct Tracer {
    inner: Arc<Inner>,
}

impl Tracer {
    pub fn new(sink: Arc<dyn TraceSink>) -> Self {
        Self::build(Some(sink))
    }

    /// Tracer that drops every record.
    pub fn disabled() -> Self {
        Self::build(None)
    }

    fn build(sink: Option<Arc<dyn TraceSink>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                filter: CsCell::new(TraceFilter::new()),
                sink,
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        cfg!(feature = "enabled") && self.inner.sink.is_some()
    }

    /// Sends `record` to the sink unless filtered out.
    pub fn emit(&self, record: TraceRecord) {
        if !cfg!(feature = "enabled") {
            return;
        }
        let Some(sink) = self.inner.sink.as_ref() else {
            return;
        };
        if !self.inner.filter.lock(|filter| filter.allows(&record)) {
            return;
        }
        if let Err(err) = sink.record(&record) {
            log::warn!("trace sink dropped {:?}: {err}", record.id());
        }
    }

    /// Runs `f` against the runtime filter tables.
    pub fn with_filter<R>(&self, f: impl FnOnce(&mut TraceFilter) -> R) -> R {
        self.inner.filter.lock(f)
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::disabled()
    }
}

impl core::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Forwards every record to `log::trace!` under the `rkh::trace` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn record(&self, record: &TraceRecord) -> Result<(), TraceError> {
        log::trace!(target: "rkh::trace", "{:?} {:?}", record.id(), record);
        Ok(())
    }
}

/// In-memory sink, optionally bounded.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<TraceRecord>>,
    capacity: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bounded(capacity: usize) -> Self {
        Self {
            records: Mutex::new(Vec::with_capacity(capacity)),
            capacity: Some(capacity),
        }
    }

    pub fn snapshot(&self) -> Vec<TraceRecord> {
        self.lock().clone()
    }

    pub fn take(&self) -> Vec<TraceRecord> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TraceRecord>> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl TraceSink for RecordingSink {
    fn record(&self, record: &TraceRecord) -> Result<(), TraceError> {
        let mut records = self.lock();
        if let Some(cap) = self.capacity {
            if records.len() >= cap {
                return Err(TraceError::BufferFull(cap));
            }
        }
        records.push(record.clone());
        Ok(())
    }
}
