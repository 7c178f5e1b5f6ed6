use async_trait::async_trait;
use esg_core::{FeatureMap, FeatureSchema, MarginPredictor, SimulationError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ModelError, ModelResult};

#[derive(Debug, Clone, Serialize)]
struct PredictRequest<'a> {
    features: &'a FeatureMap,
}

#[derive(Debug, Clone, Deserialize)]
struct PredictResponse {
    prediction: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct SchemaRejection {
    #[serde(default)]
    missing: Vec<String>,
}

/// Margin model served by a remote inference service.
#[derive(Clone)]
pub struct HttpMarginPredictor {
    client: reqwest::Client,
    base_url: String,
    schema: FeatureSchema,
    label: String,
}

impl HttpMarginPredictor {
    pub fn new(
        base_url: String,
        timeout: Duration,
        schema: FeatureSchema,
        label: impl Into<String>,
    ) -> ModelResult<Self> {
        schema.validate()?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            schema,
            label: label.into(),
        })
    }

    /// Score one feature mapping.
    pub async fn request_prediction(&self, features: &FeatureMap) -> ModelResult<f64> {
        let missing = self.schema.missing(features);
        if !missing.is_empty() {
            return Err(ModelError::MissingFeatures(missing));
        }

        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&PredictRequest { features })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
                return Err(ModelError::ModelNotLoaded);
            }
            if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
                let rejection = response
                    .json::<SchemaRejection>()
                    .await
                    .unwrap_or(SchemaRejection { missing: Vec::new() });
                return Err(ModelError::MissingFeatures(rejection.missing));
            }
            return Err(ModelError::ServiceUnavailable(format!("Status: {}", status)));
        }

        let result = response
            .json::<PredictResponse>()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        Ok(result.prediction)
    }

    /// Check service health
    pub async fn health(&self) -> ModelResult<bool> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        Ok(response.status().is_success())
    }
}

#[async_trait]
impl MarginPredictor for HttpMarginPredictor {
    async fn predict(&self, features: &FeatureMap) -> Result<f64, SimulationError> {
        self.request_prediction(features).await.map_err(|e| {
            tracing::warn!("{} prediction failed: {}", self.schema.name, e);
            e.into_simulation(&self.schema.name)
        })
    }

    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn label(&self) -> &str {
        &self.label
    }
}
