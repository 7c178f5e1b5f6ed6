use async_trait::async_trait;
use crate::{FeatureMap, FeatureSchema, FinancialSnapshot, SimulationError};

/// Trait for anything that can supply a company's latest snapshot
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self, symbol: &str) -> Result<FinancialSnapshot, SimulationError>;

    fn source_name(&self) -> &'static str;
}

/// Trait for a pre-trained margin regressor
#[async_trait]
pub trait MarginPredictor: Send + Sync {
    /// Predict one margin from a named feature mapping.
    async fn predict(&self, features: &FeatureMap) -> Result<f64, SimulationError>;

    /// Inputs this model expects
    fn schema(&self) -> &FeatureSchema;

    /// Human-readable label of the predicted quantity (e.g. "EBITDA Margin")
    fn label(&self) -> &str;
}
