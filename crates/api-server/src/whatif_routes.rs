use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use esg_core::{DerivedRatios, FeatureSchema, FinancialSnapshot, ScenarioPoint, SweepConfig};
use scenario_engine::ResultTable;
use serde::{Deserialize, Serialize};

use crate::{ApiResponse, AppError, AppState};

// ─── Request types ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

/// Sweep overrides; unset bounds fall back to the server default.
#[derive(Debug, Default, Deserialize)]
pub struct SweepQuery {
    pub lo: Option<u32>,
    pub hi: Option<u32>,
    pub step: Option<u32>,
    #[serde(default)]
    pub format: OutputFormat,
}

impl SweepQuery {
    fn resolve(&self, defaults: SweepConfig) -> SweepConfig {
        SweepConfig {
            lo: self.lo.unwrap_or(defaults.lo),
            hi: self.hi.unwrap_or(defaults.hi),
            step: self.step.unwrap_or(defaults.step),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    pub snapshot: FinancialSnapshot,
    #[serde(default)]
    pub sweep: Option<SweepConfig>,
}

// ─── Response types ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct WhatIfResponse {
    pub symbol: String,
    pub as_of: DateTime<Utc>,
    pub sweep: SweepConfig,
    pub ratios: DerivedRatios,
    pub points: Vec<ScenarioPoint>,
    pub table: ResultTable,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub label: String,
    pub schema: FeatureSchema,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub margin_a: ModelInfo,
    pub margin_b: ModelInfo,
}

pub fn whatif_routes() -> axum::Router<AppState> {
    Router::new()
        .route("/api/models", get(get_models))
        .route("/api/whatif/:symbol", get(get_whatif))
        .route("/api/simulate", post(simulate))
}

async fn get_models(State(state): State<AppState>) -> Json<ApiResponse<ModelsResponse>> {
    let a = state.sweep.margin_a();
    let b = state.sweep.margin_b();
    Json(ApiResponse::success(ModelsResponse {
        margin_a: ModelInfo {
            label: a.label().to_string(),
            schema: a.schema().clone(),
        },
        margin_b: ModelInfo {
            label: b.label().to_string(),
            schema: b.schema().clone(),
        },
    }))
}

async fn run_whatif(
    state: &AppState,
    snapshot: &FinancialSnapshot,
    sweep: SweepConfig,
    format: OutputFormat,
) -> Result<Response, AppError> {
    let result = state.sweep.simulate(snapshot, &sweep).await?;
    let table = ResultTable::build(
        &result,
        state.sweep.margin_a().label(),
        state.sweep.margin_b().label(),
    );

    if format == OutputFormat::Csv {
        let csv = table.to_csv().map_err(anyhow::Error::from)?;
        return Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv).into_response());
    }

    Ok(Json(ApiResponse::success(WhatIfResponse {
        symbol: result.symbol,
        as_of: snapshot.as_of,
        sweep,
        ratios: result.ratios,
        points: result.points,
        table,
    }))
    .into_response())
}

/// Fetch the latest snapshot for `symbol` and sweep it.
async fn get_whatif(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<SweepQuery>,
) -> Result<Response, AppError> {
    let sweep = query.resolve(state.default_sweep);
    sweep.validate()?;

    let snapshot = state.source.fetch_snapshot(&symbol).await?;
    tracing::info!(
        "What-if for {} via {} ({}..={} step {})",
        snapshot.symbol,
        state.source.source_name(),
        sweep.lo,
        sweep.hi,
        sweep.step
    );

    run_whatif(&state, &snapshot, sweep, query.format).await
}

/// Sweep a caller-supplied snapshot without touching the data source.
async fn simulate(
    State(state): State<AppState>,
    Query(query): Query<SweepQuery>,
    Json(req): Json<SimulateRequest>,
) -> Result<Response, AppError> {
    let sweep = req.sweep.unwrap_or_else(|| query.resolve(state.default_sweep));
    run_whatif(&state, &req.snapshot, sweep, query.format).await
}
