use serde::Deserialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Tunable constants for settlement matching.
///
/// The defaults encode marketplace economics: a payout of roughly 87% of
/// the order value once commission/fees are netted out, matched within a
/// five-rupee band.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReconConfig {
    /// Expected payout fraction of order value, net of marketplace fees.
    #[serde(default = "default_settlement_rate")]
    pub settlement_rate: f64,
    /// Accepted gap, in rupees, between expected and actual settlement.
    /// Inclusive on both ends.
    #[serde(default = "default_tolerance")]
    pub tolerance_rupees: f64,
}

fn default_settlement_rate() -> f64 {
    0.87
}

fn default_tolerance() -> f64 {
    5.0
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            settlement_rate: default_settlement_rate(),
            tolerance_rupees: default_tolerance(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if !(self.settlement_rate > 0.0 && self.settlement_rate <= 1.0) {
            return Err(ReconError::ConfigValidation(format!(
                "settlement_rate must be in (0, 1], got {}",
                self.settlement_rate
            )));
        }
        if !(self.tolerance_rupees >= 0.0 && self.tolerance_rupees.is_finite()) {
            return Err(ReconError::ConfigValidation(format!(
                "tolerance_rupees must be a non-negative number, got {}",
                self.tolerance_rupees
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
