use esg_core::{DerivedRatios, EsgFavorability, Feature, FeatureMap, FeatureSchema};

/// Value of one model input for a given scenario
pub fn feature_value(feature: Feature, ratios: &DerivedRatios, favor: &EsgFavorability) -> f64 {
    match feature {
        Feature::AssetTurnover => ratios.asset_turnover,
        Feature::DebtRatio => ratios.debt_ratio,
        Feature::LogAssets => ratios.log_assets,
        Feature::Roa => ratios.roa,
        Feature::NetProfitMargin => ratios.net_margin,
        Feature::CashFlowMargin => ratios.cashflow_margin,
        Feature::CapexIntensity => ratios.capex_intensity,
        Feature::EnvironmentalScore => favor.environmental,
        Feature::SocialScore => favor.social,
        Feature::GovernanceScore => favor.governance,
    }
}

/// Build the named input mapping a model with `schema` expects.
pub fn assemble(schema: &FeatureSchema, ratios: &DerivedRatios, favor: &EsgFavorability) -> FeatureMap {
    schema
        .features
        .iter()
        .map(|f| (f.column().to_string(), feature_value(*f, ratios, favor)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratios() -> DerivedRatios {
        DerivedRatios {
            debt_ratio: 0.4,
            asset_turnover: 0.5,
            log_assets: 3.0,
            roa: 0.05,
            net_margin: 0.1,
            cashflow_margin: 0.12,
            capex_intensity: 0.04,
        }
    }

    fn favor() -> EsgFavorability {
        EsgFavorability {
            environmental: 0.7,
            social: 0.6,
            governance: 0.8,
        }
    }

    #[test]
    fn test_ebitda_schema_inputs() {
        let features = assemble(&FeatureSchema::ebitda_margin(), &ratios(), &favor());
        assert_eq!(features.len(), 9);
        assert_eq!(features["ROA"], 0.05);
        assert_eq!(features["Net_Profit_Margin"], 0.1);
        assert_eq!(features["CashFlow_Margin"], 0.12);
        assert_eq!(features["ESG_Social_Score"], 0.6);
        assert!(!features.contains_key("CapEx_Intensity"));
    }

    #[test]
    fn test_operating_schema_inputs() {
        let features = assemble(&FeatureSchema::operating_margin(), &ratios(), &favor());
        assert_eq!(features.len(), 7);
        assert_eq!(features["CapEx_Intensity"], 0.04);
        assert_eq!(features["ESG_Governance_Score"], 0.8);
        assert!(!features.contains_key("ROA"));
        assert!(FeatureSchema::operating_margin().missing(&features).is_empty());
    }
}
