//! Raw process events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw event from a process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEvent {
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The type of event
    pub event_type: ProcessEventType,
    /// Optional data associated with the event
    pub data: Option<String>,
}

impl ProcessEvent {
    /// Create a new process event
    pub fn new(event_type: ProcessEventType) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            data: None,
        }
    }

    /// Create a new process event with data
    pub fn new_with_data(event_type: ProcessEventType, data: String) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            data: Some(data),
        }
    }

    /// Create an event carrying raw output bytes
    pub fn new_chunk(source: LogSource, bytes: Vec<u8>) -> Self {
        Self::new(ProcessEventType::Chunk { source, bytes })
    }

    /// Output line carried by this event, if it is a line event
    pub fn output_line(&self) -> Option<&str> {
        match self.event_type {
            ProcessEventType::Stdout | ProcessEventType::Stderr => self.data.as_deref(),
            ProcessEventType::Started { .. } | ProcessEventType::Chunk { .. } => None,
        }
    }

    /// Raw output carried by this event, if it is a chunk event
    pub fn output_chunk(&self) -> Option<&[u8]> {
        match &self.event_type {
            ProcessEventType::Chunk { bytes, .. } => Some(bytes),
            _ => None,
        }
    }
}

/// Types of raw process events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProcessEventType {
    /// Process has started
    Started {
        /// Process id of the spawned child
        pid: u32,
    },
    /// Log line from stdout
    Stdout,
    /// Log line from stderr
    Stderr,
    /// Bytes read from a pipe as they arrived, not split into lines
    Chunk {
        /// Pipe the bytes came from
        source: LogSource,
        /// The bytes, possibly invalid UTF-8
        bytes: Vec<u8>,
    },
}

/// Source of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogSource {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

impl From<LogSource> for ProcessEventType {
    fn from(source: LogSource) -> Self {
        match source {
            LogSource::Stdout => ProcessEventType::Stdout,
            LogSource::Stderr => ProcessEventType::Stderr,
        }
    }
}
