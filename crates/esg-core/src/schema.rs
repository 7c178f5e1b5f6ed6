use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::types::FeatureMap;

/// Model input known to the simulator. Serialized as the column name the
/// margin models were trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    #[serde(rename = "Asset_Turnover")]
    AssetTurnover,
    #[serde(rename = "Debt_Ratio")]
    DebtRatio,
    #[serde(rename = "Log_Assets")]
    LogAssets,
    #[serde(rename = "ROA")]
    Roa,
    #[serde(rename = "Net_Profit_Margin")]
    NetProfitMargin,
    #[serde(rename = "CashFlow_Margin")]
    CashFlowMargin,
    #[serde(rename = "CapEx_Intensity")]
    CapexIntensity,
    #[serde(rename = "ESG_Environmental_Score")]
    EnvironmentalScore,
    #[serde(rename = "ESG_Social_Score")]
    SocialScore,
    #[serde(rename = "ESG_Governance_Score")]
    GovernanceScore,
}

impl Feature {
    pub fn column(&self) -> &'static str {
        match self {
            Feature::AssetTurnover => "Asset_Turnover",
            Feature::DebtRatio => "Debt_Ratio",
            Feature::LogAssets => "Log_Assets",
            Feature::Roa => "ROA",
            Feature::NetProfitMargin => "Net_Profit_Margin",
            Feature::CashFlowMargin => "CashFlow_Margin",
            Feature::CapexIntensity => "CapEx_Intensity",
            Feature::EnvironmentalScore => "ESG_Environmental_Score",
            Feature::SocialScore => "ESG_Social_Score",
            Feature::GovernanceScore => "ESG_Governance_Score",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A schema that cannot be evaluated consistently
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("schema {0} lists no features")]
    Empty(String),

    #[error("schema {schema} lists {feature} more than once")]
    DuplicateFeature { schema: String, feature: Feature },
}

/// Versioned list of inputs one margin model expects.
///
/// Schemas travel with the model artifacts so a retrained model with a
/// different feature set does not require a code change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub name: String,
    pub version: u32,
    pub features: Vec<Feature>,
}

impl FeatureSchema {
    /// EBITDA margin model inputs
    pub fn ebitda_margin() -> Self {
        Self {
            name: "ebitda_margin".to_string(),
            version: 1,
            features: vec![
                Feature::AssetTurnover,
                Feature::DebtRatio,
                Feature::LogAssets,
                Feature::Roa,
                Feature::NetProfitMargin,
                Feature::CashFlowMargin,
                Feature::EnvironmentalScore,
                Feature::SocialScore,
                Feature::GovernanceScore,
            ],
        }
    }

    /// Operating margin model inputs
    pub fn operating_margin() -> Self {
        Self {
            name: "operating_margin".to_string(),
            version: 1,
            features: vec![
                Feature::AssetTurnover,
                Feature::DebtRatio,
                Feature::LogAssets,
                Feature::CapexIntensity,
                Feature::EnvironmentalScore,
                Feature::SocialScore,
                Feature::GovernanceScore,
            ],
        }
    }

    /// Every feature must appear exactly once, and there must be at least one.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.features.is_empty() {
            return Err(SchemaError::Empty(self.name.clone()));
        }
        let mut seen = HashSet::with_capacity(self.features.len());
        for feature in &self.features {
            if !seen.insert(*feature) {
                return Err(SchemaError::DuplicateFeature {
                    schema: self.name.clone(),
                    feature: *feature,
                });
            }
        }
        Ok(())
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.features.iter().map(|f| f.column())
    }

    /// Columns of this schema absent from `features`.
    pub fn missing(&self, features: &FeatureMap) -> Vec<String> {
        self.columns()
            .filter(|c| !features.contains_key(*c))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_json_uses_column_names() {
        let json = serde_json::to_value(FeatureSchema::operating_margin()).unwrap();
        let features = json["features"].as_array().unwrap();
        assert_eq!(features[0], "Asset_Turnover");
        assert_eq!(features[3], "CapEx_Intensity");

        let parsed: FeatureSchema = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, FeatureSchema::operating_margin());
    }

    #[test]
    fn test_missing_columns() {
        let schema = FeatureSchema::operating_margin();
        let mut features = FeatureMap::new();
        features.insert("Asset_Turnover".to_string(), 0.5);
        features.insert("Debt_Ratio".to_string(), 0.4);

        let missing = schema.missing(&features);
        assert_eq!(missing.len(), 5);
        assert!(missing.contains(&"CapEx_Intensity".to_string()));
        assert!(!missing.contains(&"Debt_Ratio".to_string()));
    }

    #[test]
    fn test_validate_rejects_duplicates_and_empty() {
        assert!(FeatureSchema::ebitda_margin().validate().is_ok());
        assert!(FeatureSchema::operating_margin().validate().is_ok());

        let doubled = FeatureSchema {
            name: "doubled".to_string(),
            version: 1,
            features: vec![Feature::DebtRatio, Feature::Roa, Feature::DebtRatio],
        };
        assert_eq!(
            doubled.validate(),
            Err(SchemaError::DuplicateFeature {
                schema: "doubled".to_string(),
                feature: Feature::DebtRatio,
            })
        );

        let empty = FeatureSchema {
            name: "empty".to_string(),
            version: 1,
            features: Vec::new(),
        };
        assert_eq!(empty.validate(), Err(SchemaError::Empty("empty".to_string())));
    }
}
