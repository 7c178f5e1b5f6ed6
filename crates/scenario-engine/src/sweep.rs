use std::sync::Arc;

use esg_core::{
    DerivedRatios, FinancialSnapshot, MarginPredictor, ScenarioPoint, ScenarioResult,
    SimulationError, SweepConfig,
};
use futures_util::stream::{FuturesUnordered, TryStreamExt};
use ratio_engine::RatioEngine;

use crate::features::assemble;
use crate::normalizer::EsgRiskNormalizer;

/// Round a predicted margin to 4 decimal digits.
///
/// Rounds the exact binary value through its decimal expansion, so
/// `2.67285` (stored as `2.672849999...`) becomes `2.6728`. Scaling by
/// 10^4 first would round the product up instead.
pub fn round_margin(value: f64) -> f64 {
    format!("{:.4}", value).parse().unwrap_or(value)
}

/// Re-scores two margin models over a range of ESG risk increases.
///
/// Predictors are injected already loaded; the sweep never loads or caches
/// models itself.
#[derive(Clone)]
pub struct ScenarioSweep {
    margin_a: Arc<dyn MarginPredictor>,
    margin_b: Arc<dyn MarginPredictor>,
    normalizer: EsgRiskNormalizer,
    ratio_engine: Arc<RatioEngine>,
}

impl ScenarioSweep {
    pub fn new(margin_a: Arc<dyn MarginPredictor>, margin_b: Arc<dyn MarginPredictor>) -> Self {
        Self {
            margin_a,
            margin_b,
            normalizer: EsgRiskNormalizer::new(),
            ratio_engine: Arc::new(RatioEngine::new()),
        }
    }

    pub fn margin_a(&self) -> &dyn MarginPredictor {
        self.margin_a.as_ref()
    }

    pub fn margin_b(&self) -> &dyn MarginPredictor {
        self.margin_b.as_ref()
    }

    /// Validate the snapshot, derive its ratios and run the sweep.
    pub async fn simulate(
        &self,
        snapshot: &FinancialSnapshot,
        config: &SweepConfig,
    ) -> Result<ScenarioResult, SimulationError> {
        snapshot.validate()?;
        let ratios = self.ratio_engine.derive(snapshot)?;
        self.run(snapshot, &ratios, config).await
    }

    /// Evaluate every percentage in order. Any failure discards the whole result.
    pub async fn run(
        &self,
        snapshot: &FinancialSnapshot,
        ratios: &DerivedRatios,
        config: &SweepConfig,
    ) -> Result<ScenarioResult, SimulationError> {
        config.validate()?;

        let percentages = config.percentages();
        let mut points = Vec::with_capacity(percentages.len());
        for pct in percentages {
            points.push(self.evaluate_point(snapshot, ratios, pct).await?);
        }

        tracing::info!(
            "{}: sweep {}..={} step {} produced {} points",
            snapshot.symbol,
            config.lo,
            config.hi,
            config.step,
            points.len()
        );

        Ok(ScenarioResult {
            symbol: snapshot.symbol.clone(),
            ratios: *ratios,
            points,
        })
    }

    /// Same contract as [`run`](Self::run) but all percentages are in flight at once.
    /// Completion order is arbitrary, so points are re-sorted before returning.
    pub async fn run_concurrent(
        &self,
        snapshot: &FinancialSnapshot,
        ratios: &DerivedRatios,
        config: &SweepConfig,
    ) -> Result<ScenarioResult, SimulationError> {
        config.validate()?;

        let mut points: Vec<ScenarioPoint> = config
            .percentages()
            .into_iter()
            .map(|pct| self.evaluate_point(snapshot, ratios, pct))
            .collect::<FuturesUnordered<_>>()
            .try_collect()
            .await?;
        points.sort_by_key(|p| p.risk_increase_pct);

        tracing::info!(
            "{}: concurrent sweep produced {} points",
            snapshot.symbol,
            points.len()
        );

        Ok(ScenarioResult {
            symbol: snapshot.symbol.clone(),
            ratios: *ratios,
            points,
        })
    }

    async fn evaluate_point(
        &self,
        snapshot: &FinancialSnapshot,
        ratios: &DerivedRatios,
        pct: u32,
    ) -> Result<ScenarioPoint, SimulationError> {
        let (amplified_risk, favorability) = self.normalizer.normalize(&snapshot.esg_risk, pct)?;

        let input_a = assemble(self.margin_a.schema(), ratios, &favorability);
        let input_b = assemble(self.margin_b.schema(), ratios, &favorability);

        let margin_a = self.margin_a.predict(&input_a).await?;
        let margin_b = self.margin_b.predict(&input_b).await?;

        tracing::debug!(
            "{} +{}%: {}={:.6} {}={:.6}",
            snapshot.symbol,
            pct,
            self.margin_a.label(),
            margin_a,
            self.margin_b.label(),
            margin_b
        );

        Ok(ScenarioPoint {
            risk_increase_pct: pct,
            amplified_risk,
            favorability,
            margin_a: round_margin(margin_a),
            margin_b: round_margin(margin_b),
        })
    }
}
