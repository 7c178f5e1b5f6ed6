pub mod whatif_routes;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use esg_core::{SimulationError, SnapshotSource, SweepConfig};
use margin_models::{MarginModels, MarginModelsConfig};
use scenario_engine::ScenarioSweep;
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use yahoo_client::YahooFinanceClient;

/// Shared handles, loaded once at startup
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn SnapshotSource>,
    pub sweep: ScenarioSweep,
    pub default_sweep: SweepConfig,
}

impl AppState {
    pub fn new(source: Arc<dyn SnapshotSource>, models: MarginModels, default_sweep: SweepConfig) -> Self {
        Self {
            source,
            sweep: ScenarioSweep::new(models.margin_a, models.margin_b),
            default_sweep,
        }
    }
}

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Handler error carrying the HTTP status to respond with
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{}: {:#}", self.status, self.error);
        } else {
            tracing::warn!("{}: {:#}", self.status, self.error);
        }
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.error.to_string()),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

impl From<SimulationError> for AppError {
    fn from(error: SimulationError) -> Self {
        let status = match &error {
            SimulationError::DataUnavailable { .. } => StatusCode::NOT_FOUND,
            SimulationError::DivisionByZero { .. }
            | SimulationError::NonPositiveValue { .. }
            | SimulationError::InvalidScore { .. }
            | SimulationError::InvalidSweep(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SimulationError::SchemaMismatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            SimulationError::ModelUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self::with_status(status, error.into())
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(whatif_routes::whatif_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn default_sweep_from_env() -> anyhow::Result<SweepConfig> {
    let defaults = SweepConfig::default();
    let read = |key: &str, fallback: u32| -> anyhow::Result<u32> {
        match std::env::var(key) {
            Ok(v) => v
                .parse()
                .map_err(|e| anyhow::anyhow!("{} must be a non-negative integer: {}", key, e)),
            Err(_) => Ok(fallback),
        }
    };
    Ok(SweepConfig::new(
        read("WHATIF_SWEEP_LO", defaults.lo)?,
        read("WHATIF_SWEEP_HI", defaults.hi)?,
        read("WHATIF_SWEEP_STEP", defaults.step)?,
    )?)
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "api_server=info,scenario_engine=info,margin_models=info,yahoo_client=info,tower_http=info".into()
            }),
        )
        .init();

    let models = MarginModels::load(&MarginModelsConfig::default())?;
    tracing::info!(
        "Margin models ready: {} / {}",
        models.margin_a.label(),
        models.margin_b.label()
    );

    let source: Arc<dyn SnapshotSource> = Arc::new(YahooFinanceClient::from_env());
    let state = AppState::new(source, models, default_sweep_from_env()?);

    let addr = std::env::var("API_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("ESG what-if API listening on {}", addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
