//! Messages exchanged between the executor and its workers.
//!
//! Each message is one JSON document per line: requests on the worker's
//! stdin, replies on its stdout. Byte blobs travel base64-encoded.
use std::io::{BufRead, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One unit of work, tagged with its position in the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub index: usize,
    pub input: PathBuf,
    /// Read-only settings snapshot shared by the whole batch.
    pub snapshot: PathBuf,
}

/// What a successful task produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutput {
    /// Destination of the saved file.
    Path(PathBuf),
    /// Lossless PNG of the processed image.
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
}

/// Per-item slot of a batch result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemResult {
    Success(TaskOutput),
    Failure { error: String },
}

impl ItemResult {
    pub fn failure<E: std::fmt::Display>(e: E) -> Self {
        ItemResult::Failure {
            error: e.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ItemResult::Success(_))
    }

    pub fn output(&self) -> Option<&TaskOutput> {
        match self {
            ItemResult::Success(out) => Some(out),
            ItemResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ItemResult::Success(_) => None,
            ItemResult::Failure { error } => Some(error),
        }
    }
}

impl From<Result<TaskOutput>> for ItemResult {
    fn from(r: Result<TaskOutput>) -> Self {
        match r {
            Ok(out) => ItemResult::Success(out),
            Err(e) => ItemResult::failure(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReply {
    pub index: usize,
    pub result: ItemResult,
}

/// Write `msg` as a single JSON line and flush.
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> Result<()> {
    serde_json::to_writer(&mut *writer, msg)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Read one JSON line; `Ok(None)` at end of stream.
pub fn read_message<R: BufRead, T: for<'de> Deserialize<'de>>(reader: &mut R) -> Result<Option<T>> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if !line.trim().is_empty() {
            break;
        }
    }
    serde_json::from_str(line.trim_end())
        .map(Some)
        .map_err(|e| Error::Worker(format!("malformed message: {}", e)))
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}
