//! Diagnostic capture of engine traffic.

use crate::error::{GateError, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Direction of a captured frame.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

#[derive(Serialize)]
struct Record {
    ts_ms: u64,
    direction: Direction,
    frame: Value,
}

/// Appends every frame of a session as one JSON line.
pub struct TrafficLog {
    writer: BufWriter<File>,
}

impl TrafficLog {
    /// Open (or create) the dump file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Record one frame. Frames that are not JSON are stored as strings.
    pub fn record(&mut self, direction: Direction, frame: &str) -> Result<()> {
        let ts_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        let frame = serde_json::from_str(frame).unwrap_or_else(|_| Value::String(frame.to_string()));

        let line = serde_json::to_string(&Record {
            ts_ms,
            direction,
            frame,
        })
        .map_err(|e| GateError::Serialization(e.to_string()))?;

        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        Ok(())
    }
}
