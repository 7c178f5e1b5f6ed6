use async_trait::async_trait;
use esg_core::{FeatureMap, FeatureSchema, MarginPredictor, SimulationError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{ModelError, ModelResult};

/// Per-feature standardization fitted alongside the regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: HashMap<String, f64>,
    pub scale: HashMap<String, f64>,
}

/// On-disk form of a scaler + linear-regression pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearArtifact {
    /// Training target column, e.g. `EBITDA_Margin`
    pub target: String,
    #[serde(default)]
    pub label: Option<String>,
    pub schema: FeatureSchema,
    pub intercept: f64,
    pub coefficients: HashMap<String, f64>,
    #[serde(default)]
    pub scaler: Option<ScalerParams>,
}

/// Evaluates `intercept + sum(w * (x - mean) / scale)` over the schema's features.
#[derive(Debug, Clone)]
pub struct LinearMarginModel {
    artifact: LinearArtifact,
    label: String,
}

impl LinearMarginModel {
    pub fn from_artifact(artifact: LinearArtifact) -> ModelResult<Self> {
        artifact.schema.validate()?;

        let expected: HashSet<&str> = artifact.schema.columns().collect();
        let actual: HashSet<&str> = artifact.coefficients.keys().map(String::as_str).collect();
        if expected != actual {
            let mut diff: Vec<&str> = expected.symmetric_difference(&actual).copied().collect();
            diff.sort_unstable();
            return Err(ModelError::InvalidArtifact(format!(
                "{}: coefficients do not match schema {} v{} (differs on {:?})",
                artifact.target, artifact.schema.name, artifact.schema.version, diff
            )));
        }

        if let Some(scaler) = &artifact.scaler {
            for column in &expected {
                if !scaler.mean.contains_key(*column) {
                    return Err(ModelError::InvalidArtifact(format!("scaler has no mean for {}", column)));
                }
                match scaler.scale.get(*column) {
                    Some(s) if *s != 0.0 && s.is_finite() => {}
                    _ => {
                        return Err(ModelError::InvalidArtifact(format!(
                            "scaler has no usable scale for {}",
                            column
                        )))
                    }
                }
            }
        }

        let label = artifact
            .label
            .clone()
            .unwrap_or_else(|| artifact.target.replace('_', " "));
        Ok(Self { artifact, label })
    }

    pub fn from_json(json: &str) -> ModelResult<Self> {
        Self::from_artifact(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let model = Self::from_json(&std::fs::read_to_string(path)?)?;
        tracing::info!(
            "Loaded linear model {} ({} v{}) from {}",
            model.artifact.target,
            model.artifact.schema.name,
            model.artifact.schema.version,
            path.display()
        );
        Ok(model)
    }

    pub fn target(&self) -> &str {
        &self.artifact.target
    }

    pub fn evaluate(&self, features: &FeatureMap) -> ModelResult<f64> {
        let missing = self.artifact.schema.missing(features);
        if !missing.is_empty() {
            return Err(ModelError::MissingFeatures(missing));
        }

        let mut prediction = self.artifact.intercept;
        for column in self.artifact.schema.columns() {
            let mut x = features[column];
            if let Some(scaler) = &self.artifact.scaler {
                x = (x - scaler.mean[column]) / scaler.scale[column];
            }
            prediction += self.artifact.coefficients[column] * x;
        }

        if !prediction.is_finite() {
            return Err(ModelError::InvalidResponse(format!(
                "{} produced a non-finite prediction",
                self.artifact.target
            )));
        }
        Ok(prediction)
    }
}

#[async_trait]
impl MarginPredictor for LinearMarginModel {
    async fn predict(&self, features: &FeatureMap) -> Result<f64, SimulationError> {
        self.evaluate(features)
            .map_err(|e| e.into_simulation(&self.artifact.schema.name))
    }

    fn schema(&self) -> &FeatureSchema {
        &self.artifact.schema
    }

    fn label(&self) -> &str {
        &self.label
    }
}
