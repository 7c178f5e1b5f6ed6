use thiserror::Error;

/// Every failure the what-if pipeline can surface. All of them are terminal
/// for the request that raised them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("Division by zero: {field} is zero")]
    DivisionByZero { field: &'static str },

    #[error("Non-positive value: {field} = {value}")]
    NonPositiveValue { field: &'static str, value: f64 },

    #[error("Invalid {pillar} risk score: {value} (expected 0-100)")]
    InvalidScore { pillar: &'static str, value: f64 },

    #[error("Schema mismatch for {model}: missing {missing:?}")]
    SchemaMismatch { model: String, missing: Vec<String> },

    #[error("Model unavailable: {model}: {reason}")]
    ModelUnavailable { model: String, reason: String },

    #[error("Invalid sweep: {0}")]
    InvalidSweep(String),
}

impl SimulationError {
    pub fn data_unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    pub fn model_unavailable(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            model: model.into(),
            reason: reason.into(),
        }
    }
}

pub type SimulationResult<T> = Result<T, SimulationError>;
