use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{SimulationError, SimulationResult};

/// Named model inputs, keyed by the column names the predictors were trained on.
pub type FeatureMap = HashMap<String, f64>;

/// Raw ESG risk scores as sourced (0-100, lower is better)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EsgRiskScores {
    pub environmental: f64,
    pub social: f64,
    pub governance: f64,
}

/// Favorability complements of [`EsgRiskScores`] (0-1, higher is better)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EsgFavorability {
    pub environmental: f64,
    pub social: f64,
    pub governance: f64,
}

/// One company's statement line items and ESG risk at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub symbol: String,
    #[serde(default = "Utc::now")]
    pub as_of: DateTime<Utc>,
    pub total_assets: f64,
    pub total_liabilities: f64,
    pub revenue: f64,
    pub net_income: f64,
    pub operating_cash_flow: f64,
    /// Signed as reported; usually negative (cash outflow)
    pub capital_expenditure: f64,
    pub esg_risk: EsgRiskScores,
}

impl FinancialSnapshot {
    /// Reject snapshots carrying non-finite statement values.
    ///
    /// ESG ranges are not checked here; the normalizer owns that rule.
    pub fn validate(&self) -> SimulationResult<()> {
        if self.symbol.trim().is_empty() {
            return Err(SimulationError::data_unavailable("<empty>", "missing symbol"));
        }

        let fields = [
            ("total_assets", self.total_assets),
            ("total_liabilities", self.total_liabilities),
            ("revenue", self.revenue),
            ("net_income", self.net_income),
            ("operating_cash_flow", self.operating_cash_flow),
            ("capital_expenditure", self.capital_expenditure),
            ("environment_risk", self.esg_risk.environmental),
            ("social_risk", self.esg_risk.social),
            ("governance_risk", self.esg_risk.governance),
        ];

        match fields.iter().find(|(_, v)| !v.is_finite()) {
            Some((name, value)) => Err(SimulationError::data_unavailable(
                &self.symbol,
                format!("{} is not a finite number ({})", name, value),
            )),
            None => Ok(()),
        }
    }
}

/// Ratios derived from a [`FinancialSnapshot`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedRatios {
    pub debt_ratio: f64,
    pub asset_turnover: f64,
    pub log_assets: f64,
    pub roa: f64,
    pub net_margin: f64,
    pub cashflow_margin: f64,
    pub capex_intensity: f64,
}

/// Risk-increase range swept by one simulation: `lo, lo+step, ..., <= hi`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub lo: u32,
    pub hi: u32,
    pub step: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            lo: 0,
            hi: 100,
            step: 20,
        }
    }
}

impl SweepConfig {
    pub const MAX_PCT: u32 = 100;

    pub fn new(lo: u32, hi: u32, step: u32) -> SimulationResult<Self> {
        let config = Self { lo, hi, step };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimulationResult<()> {
        if self.step == 0 {
            return Err(SimulationError::InvalidSweep("step must be positive".to_string()));
        }
        if self.lo > self.hi {
            return Err(SimulationError::InvalidSweep(format!(
                "lo ({}) must not exceed hi ({})",
                self.lo, self.hi
            )));
        }
        if self.hi > Self::MAX_PCT {
            return Err(SimulationError::InvalidSweep(format!(
                "hi ({}) must be within 0-{}",
                self.hi,
                Self::MAX_PCT
            )));
        }
        Ok(())
    }

    /// Percentages in sweep order. `hi` is only included when it lies on the step grid.
    pub fn percentages(&self) -> Vec<u32> {
        if self.step == 0 || self.lo > self.hi {
            return Vec::new();
        }
        (self.lo..=self.hi).step_by(self.step as usize).collect()
    }
}

/// One evaluated percentage of the sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPoint {
    pub risk_increase_pct: u32,
    pub amplified_risk: EsgRiskScores,
    pub favorability: EsgFavorability,
    /// Rounded to 4 decimals
    pub margin_a: f64,
    /// Rounded to 4 decimals
    pub margin_b: f64,
}

/// Ordered sweep output for one company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub symbol: String,
    pub ratios: DerivedRatios,
    pub points: Vec<ScenarioPoint>,
}

/// Flat display/serialization record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginRow {
    pub risk_increase_pct: u32,
    pub margin_a: f64,
    pub margin_b: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> FinancialSnapshot {
        FinancialSnapshot {
            symbol: "TEST".to_string(),
            as_of: Utc::now(),
            total_assets: 1000.0,
            total_liabilities: 400.0,
            revenue: 500.0,
            net_income: 50.0,
            operating_cash_flow: 60.0,
            capital_expenditure: -20.0,
            esg_risk: EsgRiskScores {
                environmental: 30.0,
                social: 40.0,
                governance: 20.0,
            },
        }
    }

    #[test]
    fn test_sweep_percentages_default() {
        assert_eq!(SweepConfig::default().percentages(), vec![0, 20, 40, 60, 80, 100]);
    }

    #[test]
    fn test_sweep_percentages_unaligned_hi() {
        let config = SweepConfig::new(10, 95, 20).unwrap();
        assert_eq!(config.percentages(), vec![10, 30, 50, 70, 90]);
    }

    #[test]
    fn test_sweep_single_point() {
        let config = SweepConfig::new(0, 0, 20).unwrap();
        assert_eq!(config.percentages(), vec![0]);
    }

    #[test]
    fn test_sweep_rejects_bad_config() {
        assert!(matches!(SweepConfig::new(0, 100, 0), Err(SimulationError::InvalidSweep(_))));
        assert!(matches!(SweepConfig::new(60, 40, 10), Err(SimulationError::InvalidSweep(_))));
        assert!(matches!(SweepConfig::new(0, 120, 20), Err(SimulationError::InvalidSweep(_))));
    }

    #[test]
    fn test_snapshot_validate() {
        assert!(snapshot().validate().is_ok());

        let mut bad = snapshot();
        bad.revenue = f64::NAN;
        match bad.validate() {
            Err(SimulationError::DataUnavailable { symbol, reason }) => {
                assert_eq!(symbol, "TEST");
                assert!(reason.contains("revenue"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_deserializes_without_as_of() {
        let json = r#"{
            "symbol": "ACME",
            "total_assets": 1000.0,
            "total_liabilities": 400.0,
            "revenue": 500.0,
            "net_income": 50.0,
            "operating_cash_flow": 60.0,
            "capital_expenditure": -20.0,
            "esg_risk": {"environmental": 30.0, "social": 40.0, "governance": 20.0}
        }"#;
        let snap: FinancialSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.symbol, "ACME");
        assert_eq!(snap.esg_risk.social, 40.0);
    }
}
