// Copyright (c) 2025 The Resona Authors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Download types: composite identifiers, transfer states, and status.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Composite identifier for one in-flight transfer: `username:filePath`.
///
/// The pair uniquely identifies a transfer; re-requesting the same file
/// from the same user overwrites the previous record and status wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadId {
    username: String,
    file_path: String,
}

/// A download id that could not be split into username and path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedDownloadId(pub String);

impl std::fmt::Display for MalformedDownloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid download id format: {}", self.0)
    }
}

impl std::error::Error for MalformedDownloadId {}

impl DownloadId {
    pub fn new(username: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            file_path: file_path.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Bare filename component of the remote path. Soulseek paths are
    /// backslash-separated, but forward slashes show up in the wild too.
    pub fn file_name(&self) -> &str {
        self.file_path
            .rsplit(['\\', '/'])
            .next()
            .unwrap_or(&self.file_path)
    }
}

impl std::fmt::Display for DownloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.username, self.file_path)
    }
}

impl std::str::FromStr for DownloadId {
    type Err = MalformedDownloadId;

    /// Split on the first colon; remote paths may contain colons of their
    /// own, usernames may not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((username, file_path)) => Ok(Self::new(username, file_path)),
            None => Err(MalformedDownloadId(s.to_string())),
        }
    }
}

/// Local transfer lifecycle state.
///
/// States only move forward toward a terminal state; a terminal download
/// is never resurrected under the same id unless a new request reissues
/// it, overwriting record and status entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferState {
    /// No transfer is tracked under the queried id.
    NotStarted,
    Queued,
    Downloading,
    Finished,
    Failed,
    Cancelled,
    /// The monitoring budget expired while the transfer was still live.
    TimedOut,
    /// A gateway state with no local mapping, passed through unchanged.
    Other(String),
}

impl TransferState {
    /// Map a gateway transfer state onto the local lifecycle.
    pub fn from_gateway(state: &str) -> Self {
        match state {
            "Queued" => TransferState::Queued,
            "Downloading" => TransferState::Downloading,
            "Completed" => TransferState::Finished,
            "Failed" => TransferState::Failed,
            "Cancelled" => TransferState::Cancelled,
            other => TransferState::Other(other.to_string()),
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Finished
                | TransferState::Failed
                | TransferState::Cancelled
                | TransferState::TimedOut
        )
    }
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferState::NotStarted => write!(f, "Not started"),
            TransferState::Queued => write!(f, "Queued"),
            TransferState::Downloading => write!(f, "Downloading"),
            TransferState::Finished => write!(f, "Finished"),
            TransferState::Failed => write!(f, "Failed"),
            TransferState::Cancelled => write!(f, "Cancelled"),
            TransferState::TimedOut => write!(f, "Timed out"),
            TransferState::Other(state) => write!(f, "{}", state),
        }
    }
}

impl Serialize for TransferState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Progress snapshot for one transfer, replaced wholesale each monitoring
/// round.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadStatus {
    #[serde(rename = "status")]
    pub state: TransferState,
    /// Bytes transferred so far.
    pub progress: u64,
    /// Total bytes expected.
    pub total: u64,
    pub percent: f64,
    /// Average speed in bytes per second.
    pub speed: f64,
    pub queue_position: Option<u32>,
    pub error_message: Option<String>,
}

impl DownloadStatus {
    /// Initial status right after a download request is accepted.
    pub fn queued(total: u64) -> Self {
        Self {
            state: TransferState::Queued,
            progress: 0,
            total,
            percent: 0.0,
            speed: 0.0,
            queue_position: None,
            error_message: None,
        }
    }

    /// Synthesized status for an id that was never tracked.
    pub fn not_started() -> Self {
        Self {
            state: TransferState::NotStarted,
            progress: 0,
            total: 0,
            percent: 0.0,
            speed: 0.0,
            queue_position: None,
            error_message: None,
        }
    }
}

/// Completion percentage, zero when the total is unknown.
pub fn percent(progress: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        progress as f64 / total as f64 * 100.0
    }
}

/// Bookkeeping for one requested download, kept until explicit
/// cancellation or process restart.
#[derive(Debug, Clone)]
pub struct DownloadRecord {
    pub id: DownloadId,
    pub file_name: String,
    pub metadata: Option<Value>,
    pub size: u64,
    pub started_at: DateTime<Utc>,
}

/// One entry of the full download listing: record joined with status.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadOverview {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    /// Duplicate of `file_path`, kept for older clients.
    pub path: String,
    pub username: String,
    pub size: u64,
    pub metadata: Option<Value>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    pub status: TransferState,
    pub progress: u64,
    pub total: u64,
    pub percent: f64,
    pub speed: f64,
    pub queue_position: Option<u32>,
    pub error_message: Option<String>,
    /// `(total - progress) / speed` seconds, absent when the speed is zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<f64>,
}

/// Estimated seconds remaining, when the transfer has measurable speed.
pub fn time_remaining(progress: u64, total: u64, speed: f64) -> Option<f64> {
    if speed > 0.0 {
        Some(total.saturating_sub(progress) as f64 / speed)
    } else {
        None
    }
}
