use esg_core::{DerivedRatios, FinancialSnapshot, SimulationError};

/// Derives the balance-sheet / income ratios the margin models consume.
pub struct RatioEngine;

impl RatioEngine {
    pub fn new() -> Self {
        Self
    }

    fn calculate_debt_ratio(&self, liabilities: f64, assets: f64) -> f64 {
        liabilities / assets
    }

    fn calculate_asset_turnover(&self, revenue: f64, assets: f64) -> f64 {
        revenue / assets
    }

    fn calculate_log_assets(&self, assets: f64) -> Result<f64, SimulationError> {
        if assets <= 0.0 {
            return Err(SimulationError::NonPositiveValue {
                field: "total_assets",
                value: assets,
            });
        }
        Ok(assets.log10())
    }

    fn calculate_roa(&self, net_income: f64, assets: f64) -> f64 {
        net_income / assets
    }

    fn calculate_net_margin(&self, net_income: f64, revenue: f64) -> f64 {
        net_income / revenue
    }

    fn calculate_cashflow_margin(&self, operating_cash_flow: f64, revenue: f64) -> f64 {
        operating_cash_flow / revenue
    }

    fn calculate_capex_intensity(&self, capex: f64, revenue: f64) -> f64 {
        // Capex is reported signed (outflow negative); intensity is magnitude only
        capex.abs() / revenue
    }

    /// Compute every ratio for one snapshot.
    ///
    /// Fails on a zero denominator (assets, revenue) or a non-positive
    /// log10 argument rather than returning a placeholder value.
    pub fn derive(&self, snapshot: &FinancialSnapshot) -> Result<DerivedRatios, SimulationError> {
        let assets = snapshot.total_assets;
        let revenue = snapshot.revenue;

        if assets == 0.0 {
            return Err(SimulationError::DivisionByZero {
                field: "total_assets",
            });
        }
        let log_assets = self.calculate_log_assets(assets)?;
        if revenue == 0.0 {
            return Err(SimulationError::DivisionByZero { field: "revenue" });
        }

        let ratios = DerivedRatios {
            debt_ratio: self.calculate_debt_ratio(snapshot.total_liabilities, assets),
            asset_turnover: self.calculate_asset_turnover(revenue, assets),
            log_assets,
            roa: self.calculate_roa(snapshot.net_income, assets),
            net_margin: self.calculate_net_margin(snapshot.net_income, revenue),
            cashflow_margin: self.calculate_cashflow_margin(snapshot.operating_cash_flow, revenue),
            capex_intensity: self.calculate_capex_intensity(snapshot.capital_expenditure, revenue),
        };

        tracing::debug!(
            "{}: debt_ratio={:.4} asset_turnover={:.4} log_assets={:.4}",
            snapshot.symbol,
            ratios.debt_ratio,
            ratios.asset_turnover,
            ratios.log_assets
        );

        Ok(ratios)
    }
}

impl Default for RatioEngine {
    fn default() -> Self {
        Self::new()
    }
}
