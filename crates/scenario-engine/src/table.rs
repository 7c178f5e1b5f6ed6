use esg_core::{MarginRow, ScenarioResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PCT_COLUMN: &str = "Risk +%";

#[derive(Error, Debug)]
pub enum TableError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Flat, display-ready view of a [`ScenarioResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub symbol: String,
    pub margin_a_label: String,
    pub margin_b_label: String,
    pub rows: Vec<MarginRow>,
}

impl ResultTable {
    /// One row per scenario point, in sweep order. Values are copied as-is;
    /// rounding already happened in the sweep.
    pub fn rows(result: &ScenarioResult) -> Vec<MarginRow> {
        result
            .points
            .iter()
            .map(|p| MarginRow {
                risk_increase_pct: p.risk_increase_pct,
                margin_a: p.margin_a,
                margin_b: p.margin_b,
            })
            .collect()
    }

    pub fn build(result: &ScenarioResult, margin_a_label: &str, margin_b_label: &str) -> Self {
        Self {
            symbol: result.symbol.clone(),
            margin_a_label: margin_a_label.to_string(),
            margin_b_label: margin_b_label.to_string(),
            rows: Self::rows(result),
        }
    }

    pub fn to_csv(&self) -> Result<String, TableError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([PCT_COLUMN, self.margin_a_label.as_str(), self.margin_b_label.as_str()])?;
        for row in &self.rows {
            writer.write_record(&[
                row.risk_increase_pct.to_string(),
                row.margin_a.to_string(),
                row.margin_b.to_string(),
            ])?;
        }
        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8(bytes)?)
    }
}
