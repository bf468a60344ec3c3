//! Result sinks: where completed ticks and resolved requests go.
//!
//! A sink failure never stops the show. The engine logs it and carries on.

use std::sync::{Arc, Mutex, PoisonError};

use ringside_types::{RequestRecord, TickResult};

/// A sink could not accept a record.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Writing failed.
    #[error("sink I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The record could not be serialized.
    #[error("sink serialization error: {source}")]
    Serialize {
        /// The underlying serde error.
        #[from]
        source: serde_json::Error,
    },

    /// The sink refused the record.
    #[error("sink rejected record: {message}")]
    Rejected {
        /// Why.
        message: String,
    },
}

/// Receives the engine's output.
pub trait ResultSink: Send {
    /// Called once per completed tick, in tick order.
    fn record_tick(&mut self, result: &TickResult) -> Result<(), SinkError>;

    /// Called with every request resolved during a tick, before
    /// [`ResultSink::record_tick`] for that tick.
    fn record_requests(&mut self, records: &[RequestRecord]) -> Result<(), SinkError>;
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ResultSink for NullSink {
    fn record_tick(&mut self, _result: &TickResult) -> Result<(), SinkError> {
        Ok(())
    }

    fn record_requests(&mut self, _records: &[RequestRecord]) -> Result<(), SinkError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Recorded {
    ticks: Vec<TickResult>,
    requests: Vec<RequestRecord>,
}

/// Keeps everything in memory. Clones share the same storage, so a test can
/// hand one clone to the engine and read through the other.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<Recorded>>,
}

impl MemorySink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every tick recorded so far.
    pub fn ticks(&self) -> Vec<TickResult> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ticks
            .clone()
    }

    /// Every resolved request recorded so far.
    pub fn requests(&self) -> Vec<RequestRecord> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .requests
            .clone()
    }
}

impl ResultSink for MemorySink {
    fn record_tick(&mut self, result: &TickResult) -> Result<(), SinkError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ticks
            .push(result.clone());
        Ok(())
    }

    fn record_requests(&mut self, records: &[RequestRecord]) -> Result<(), SinkError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .requests
            .extend_from_slice(records);
        Ok(())
    }
}
