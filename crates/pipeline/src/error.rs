use std::fmt;

use chrono::NaiveDate;
use hisab_store::StoreError;

#[derive(Debug)]
pub enum PipelineError {
    /// Persistence failure below the orchestration layer.
    Store(StoreError),
    /// Config file could not be parsed or failed validation.
    Config(String),
    /// Upload rejected before any processing: the monthly quota is spent.
    QuotaExceeded {
        used: u32,
        limit: u32,
        resets_on: NaiveDate,
    },
    /// Dashboard report name outside the known family.
    UnknownReport(String),
    /// The job queue has shut down and cannot accept work.
    QueueClosed,
    /// A running job observed the shutdown flag and stopped.
    JobCancelled,
    /// A running job crossed its deadline and stopped.
    JobTimedOut { deadline_secs: u64 },
    /// An upload did not reach a terminal status within the wait window.
    WaitTimeout { upload_id: String },
    /// A report value failed to serialize for the cache or the wire.
    Serialize(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store error: {e}"),
            Self::Config(msg) => write!(f, "config error: {msg}"),
            Self::QuotaExceeded {
                used,
                limit,
                resets_on,
            } => write!(
                f,
                "monthly upload quota exceeded ({used}/{limit} used, resets {resets_on})"
            ),
            Self::UnknownReport(name) => write!(f, "unknown report '{name}'"),
            Self::QueueClosed => write!(f, "job queue is shut down"),
            Self::JobCancelled => write!(f, "job cancelled during shutdown"),
            Self::JobTimedOut { deadline_secs } => {
                write!(f, "job exceeded its {deadline_secs}s deadline")
            }
            Self::WaitTimeout { upload_id } => {
                write!(f, "upload {upload_id} did not finish within the wait window")
            }
            Self::Serialize(msg) => write!(f, "report serialization failed: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}
