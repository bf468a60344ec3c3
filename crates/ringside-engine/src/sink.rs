//! JSON-lines result log.
//!
//! One line per resolved request and one per tick, each tagged with a
//! `record` field so a reader can tell them apart. The file is flushed after
//! every tick.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use ringside_core::sink::{ResultSink, SinkError};
use ringside_types::{RequestRecord, TickResult};
use serde::Serialize;

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum Line<'a> {
    Request(&'a RequestRecord),
    Tick(&'a TickResult),
}

/// Appends records to a JSON-lines file.
pub struct JsonlSink<W: Write> {
    writer: W,
}

impl JsonlSink<BufWriter<File>> {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonlSink<W> {
    /// Write to `writer`.
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    fn write_line(&mut self, line: &Line<'_>) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, line)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// The underlying writer.
    #[cfg(test)]
    pub const fn get_ref(&self) -> &W {
        &self.writer
    }
}

impl<W: Write + Send> ResultSink for JsonlSink<W> {
    fn record_tick(&mut self, result: &TickResult) -> Result<(), SinkError> {
        self.write_line(&Line::Tick(result))?;
        self.writer.flush()?;
        Ok(())
    }

    fn record_requests(&mut self, records: &[RequestRecord]) -> Result<(), SinkError> {
        for record in records {
            self.write_line(&Line::Request(record))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use ringside_types::{
        AgentId, DecisionSource, MatchPhase, RequestId, StateSnapshot, TickId,
    };

    use super::*;

    fn tick() -> TickResult {
        TickResult {
            tick_id: TickId::new(),
            time_index: 3,
            applied_actions: Vec::new(),
            state_snapshot: StateSnapshot {
                current_tick: 3,
                heat: 61,
                momentum: 4,
                phase: MatchPhase::InProgress,
                finish_pending: false,
                warnings: 1,
                wrestlers: BTreeMap::new(),
                feuds: BTreeMap::new(),
            },
            heat_update: None,
        }
    }

    #[test]
    fn writes_one_tagged_line_per_record() {
        let mut sink = JsonlSink::new(Vec::new());
        sink.record_requests(&[RequestRecord {
            request_id: RequestId::new(),
            agent_id: AgentId::new(),
            due_tick: 3,
            attempts: 1,
            source: DecisionSource::Fallback,
            failures: vec!["decision service error: down".to_owned()],
        }])
        .unwrap();
        sink.record_tick(&tick()).unwrap();

        let text = String::from_utf8(sink.get_ref().clone()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines.first().and_then(|l| l.get("record")),
            Some(&serde_json::json!("request"))
        );
        let tick_line = lines.get(1).unwrap();
        assert_eq!(tick_line.get("record"), Some(&serde_json::json!("tick")));
        assert_eq!(tick_line.get("time_index"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn open_appends_to_a_file() {
        let path = std::env::temp_dir().join(format!(
            "ringside_sink_{}_{:?}.jsonl",
            std::process::id(),
            std::thread::current().id()
        ));
        std::fs::remove_file(&path).ok();
        for _ in 0..2 {
            let mut sink = JsonlSink::open(&path).unwrap();
            sink.record_tick(&tick()).unwrap();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        std::fs::remove_file(&path).ok();
    }
}
