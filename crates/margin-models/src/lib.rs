pub mod error;
pub mod http;
pub mod linear;

pub use error::{ModelError, ModelResult};
pub use http::HttpMarginPredictor;
pub use linear::{LinearArtifact, LinearMarginModel, ScalerParams};

use esg_core::{FeatureSchema, MarginPredictor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Where one margin model comes from. A service URL wins over a local artifact.
#[derive(Debug, Clone)]
pub struct ModelSlotConfig {
    pub artifact_path: Option<PathBuf>,
    pub service_url: Option<String>,
    /// Overrides the default schema for remote models
    pub schema_path: Option<PathBuf>,
}

/// Configuration for both margin models
#[derive(Debug, Clone)]
pub struct MarginModelsConfig {
    pub margin_a: ModelSlotConfig,
    pub margin_b: ModelSlotConfig,
    pub timeout: Duration,
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl Default for MarginModelsConfig {
    fn default() -> Self {
        Self {
            margin_a: ModelSlotConfig {
                artifact_path: Some(
                    env_path("MARGIN_A_MODEL_PATH")
                        .unwrap_or_else(|| PathBuf::from("models/ebitda_margin_model.json")),
                ),
                service_url: env_string("MARGIN_A_URL"),
                schema_path: env_path("MARGIN_SCHEMA_A_PATH"),
            },
            margin_b: ModelSlotConfig {
                artifact_path: Some(
                    env_path("MARGIN_B_MODEL_PATH")
                        .unwrap_or_else(|| PathBuf::from("models/operating_margin_model.json")),
                ),
                service_url: env_string("MARGIN_B_URL"),
                schema_path: env_path("MARGIN_SCHEMA_B_PATH"),
            },
            timeout: Duration::from_secs(
                std::env::var("MARGIN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}

pub fn load_schema(path: &Path) -> ModelResult<FeatureSchema> {
    let schema: FeatureSchema = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    schema.validate()?;
    Ok(schema)
}

fn load_slot(
    slot: &ModelSlotConfig,
    timeout: Duration,
    default_schema: FeatureSchema,
    default_label: &str,
) -> ModelResult<Arc<dyn MarginPredictor>> {
    if let Some(url) = &slot.service_url {
        let schema = match &slot.schema_path {
            Some(path) => load_schema(path)?,
            None => default_schema,
        };
        tracing::info!("Using remote {} model at {}", schema.name, url);
        return Ok(Arc::new(HttpMarginPredictor::new(
            url.clone(),
            timeout,
            schema,
            default_label,
        )?));
    }

    match &slot.artifact_path {
        Some(path) => Ok(Arc::new(LinearMarginModel::load(path)?)),
        None => Err(ModelError::NotConfigured(format!(
            "no artifact or service configured for {}",
            default_schema.name
        ))),
    }
}

/// The two loaded margin predictors ("margin-A" = EBITDA, "margin-B" = operating)
#[derive(Clone)]
pub struct MarginModels {
    pub margin_a: Arc<dyn MarginPredictor>,
    pub margin_b: Arc<dyn MarginPredictor>,
}

impl MarginModels {
    /// Load both models once; callers share the handles.
    pub fn load(config: &MarginModelsConfig) -> ModelResult<Self> {
        let margin_a = load_slot(
            &config.margin_a,
            config.timeout,
            FeatureSchema::ebitda_margin(),
            "EBITDA Margin",
        )?;
        let margin_b = load_slot(
            &config.margin_b,
            config.timeout,
            FeatureSchema::operating_margin(),
            "Operating Margin",
        )?;
        Ok(Self { margin_a, margin_b })
    }
}
