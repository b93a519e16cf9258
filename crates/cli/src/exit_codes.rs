//! CLI exit code registry.
//!
//! Single source of truth for every exit code the `hisab` binary returns.
//! Exit codes are part of the shell contract; scripts depend on them.
//!
//! # Exit Code Ranges
//!
//! | Range | Domain  | Description                                  |
//! |-------|---------|----------------------------------------------|
//! | 0     | -       | Success                                      |
//! | 1     | -       | General error (unspecified)                  |
//! | 2     | -       | Usage error (bad args, unreadable config)    |
//! | 3-9   | ingest  | Upload outcomes and quota                    |
//! | 10-19 | store   | Persistence                                  |
//! | 20-29 | report  | Dashboard reads                              |

use hisab_pipeline::PipelineError;

/// Command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error. Prefer a specific code.
pub const EXIT_ERROR: u8 = 1;

/// Bad arguments, missing file, invalid config.
pub const EXIT_USAGE: u8 = 2;

/// The upload ran and resolved to `failed`.
pub const EXIT_INGEST_FAILED: u8 = 3;

/// Monthly upload quota spent; nothing was written.
pub const EXIT_QUOTA: u8 = 4;

/// The watched upload did not resolve within the window.
pub const EXIT_WATCH_TIMEOUT: u8 = 5;

/// Database unreachable or a store write refused.
pub const EXIT_STORE: u8 = 10;

/// Report name outside the known family.
pub const EXIT_REPORT_UNKNOWN: u8 = 20;

pub fn pipeline_exit_code(err: &PipelineError) -> u8 {
    match err {
        PipelineError::QuotaExceeded { .. } => EXIT_QUOTA,
        PipelineError::UnknownReport(_) => EXIT_REPORT_UNKNOWN,
        PipelineError::Store(_) => EXIT_STORE,
        PipelineError::Config(_) => EXIT_USAGE,
        PipelineError::WaitTimeout { .. } => EXIT_WATCH_TIMEOUT,
        _ => EXIT_ERROR,
    }
}
