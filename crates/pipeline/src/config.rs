use hisab_recon::ReconConfig;
use serde::Deserialize;

use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Knobs for the orchestration layer: worker pool size, the monthly upload
/// quota, the per-job deadline and the report staleness windows.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Background ingestion workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Uploads allowed per seller per calendar month.
    #[serde(default = "default_monthly_upload_limit")]
    pub monthly_upload_limit: u32,
    /// Hard ceiling on one ingestion job, queue wait included.
    #[serde(default = "default_job_deadline_secs")]
    pub job_deadline_secs: u64,
    /// Staleness window for the live-metrics cache entry.
    #[serde(default = "default_live_metrics_ttl_secs")]
    pub live_metrics_ttl_secs: u64,
    /// Staleness window for every other report's cache entry.
    #[serde(default = "default_report_ttl_secs")]
    pub report_ttl_secs: u64,
    #[serde(default)]
    pub recon: ReconConfig,
}

fn default_workers() -> usize {
    2
}

fn default_monthly_upload_limit() -> u32 {
    50
}

fn default_job_deadline_secs() -> u64 {
    600
}

fn default_live_metrics_ttl_secs() -> u64 {
    300
}

fn default_report_ttl_secs() -> u64 {
    600
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            monthly_upload_limit: default_monthly_upload_limit(),
            job_deadline_secs: default_job_deadline_secs(),
            live_metrics_ttl_secs: default_live_metrics_ttl_secs(),
            report_ttl_secs: default_report_ttl_secs(),
            recon: ReconConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl PipelineConfig {
    pub fn from_toml(input: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig =
            toml::from_str(input).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.workers == 0 {
            return Err(PipelineError::Config(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.job_deadline_secs == 0 {
            return Err(PipelineError::Config(
                "job_deadline_secs must be at least 1".to_string(),
            ));
        }
        self.recon
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
