use esg_core::{SchemaError, SimulationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Missing features: {0:?}")]
    MissingFeatures(Vec<String>),

    #[error("Invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("Invalid feature schema: {0}")]
    InvalidSchema(#[from] SchemaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl ModelError {
    /// Map onto the simulator's taxonomy, tagging the failing model.
    pub fn into_simulation(self, model: &str) -> SimulationError {
        match self {
            ModelError::MissingFeatures(missing) => SimulationError::SchemaMismatch {
                model: model.to_string(),
                missing,
            },
            other => SimulationError::model_unavailable(model, other.to_string()),
        }
    }
}

pub type ModelResult<T> = Result<T, ModelError>;
