//! Domain types for the exchange store
//!
//! These types are storage-agnostic - they don't know about SQLite or
//! USearch. Storage wrappers handle serialization/deserialization.

use serde::{Deserialize, Serialize};

/// One recorded user/assistant turn pair, the unit of retrieval
///
/// Exchanges are created by the ingestion side and are immutable
/// afterwards; the retrieval engine never mutates or deletes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    /// Unique identifier, stable across re-indexing
    #[serde(default)]
    pub id: String,
    pub project: String,
    /// ISO-8601 timestamp; sorts lexicographically
    pub timestamp: String,
    pub user_message: String,
    pub assistant_message: String,
    /// Path to the source transcript file
    pub archive_path: String,
    /// 1-indexed inclusive line range locating the exchange in its archive
    pub line_start: u32,
    pub line_end: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

/// A tool invocation recorded inside an exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub input: serde_json::Value,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub is_error: bool,
}

impl Exchange {
    /// Combined text used for embedding the exchange
    pub fn combined_text(&self) -> String {
        format!("{}\n{}", self.user_message, self.assistant_message)
    }
}

/// Inclusive date bounds on the `timestamp` field
///
/// Bounds are the raw `YYYY-MM-DD` strings compared lexicographically
/// against the stored ISO-8601 timestamps (valid because both sort
/// lexicographically). Note the consequence for `before`: a timestamp on
/// the bound day that carries a time-of-day suffix compares greater than
/// the bare date and is excluded.
#[derive(Debug, Clone, Default)]
pub struct DateRange {
    pub after: Option<String>,
    pub before: Option<String>,
}

impl DateRange {
    pub fn is_unbounded(&self) -> bool {
        self.after.is_none() && self.before.is_none()
    }

    /// Inclusive lexicographic containment check
    pub fn contains(&self, timestamp: &str) -> bool {
        if let Some(ref after) = self.after {
            if timestamp < after.as_str() {
                return false;
            }
        }
        if let Some(ref before) = self.before {
            if timestamp > before.as_str() {
                return false;
            }
        }
        true
    }
}
