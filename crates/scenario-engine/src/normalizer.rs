//! Risk amplification and risk-to-favorability conversion.
//!
//! Raw ESG scores are sourced as risk (0-100, lower is better). The margin
//! models were trained on favorability (0-1, higher is better), so every
//! score passes through `favorability = 1 - risk / 100` after amplification.

use esg_core::{EsgFavorability, EsgRiskScores, SimulationError};

/// Domain ceiling of a raw risk score
pub const MAX_RISK: f64 = 100.0;

/// `1 + increase_pct / 100`
pub fn amplification_factor(increase_pct: u32) -> f64 {
    1.0 + increase_pct as f64 / 100.0
}

/// Scale a raw risk score by `increase_pct`, saturating at [`MAX_RISK`].
pub fn amplify(pillar: &'static str, raw: f64, increase_pct: u32) -> Result<f64, SimulationError> {
    if !(0.0..=MAX_RISK).contains(&raw) {
        return Err(SimulationError::InvalidScore { pillar, value: raw });
    }
    Ok((raw * amplification_factor(increase_pct)).min(MAX_RISK))
}

/// Complement of an (already clamped) risk score, in [0, 1].
pub fn favorability(amplified: f64) -> f64 {
    1.0 - amplified / MAX_RISK
}

/// Applies the amplification identically to all three pillars.
#[derive(Debug, Clone, Copy, Default)]
pub struct EsgRiskNormalizer;

impl EsgRiskNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(
        &self,
        raw: &EsgRiskScores,
        increase_pct: u32,
    ) -> Result<(EsgRiskScores, EsgFavorability), SimulationError> {
        let amplified = EsgRiskScores {
            environmental: amplify("environmental", raw.environmental, increase_pct)?,
            social: amplify("social", raw.social, increase_pct)?,
            governance: amplify("governance", raw.governance, increase_pct)?,
        };
        let favor = EsgFavorability {
            environmental: favorability(amplified.environmental),
            social: favorability(amplified.social),
            governance: favorability(amplified.governance),
        };
        Ok((amplified, favor))
    }
}
