pub mod features;
pub mod normalizer;
pub mod sweep;
pub mod table;

pub use normalizer::EsgRiskNormalizer;
pub use sweep::{round_margin, ScenarioSweep};
pub use table::{ResultTable, TableError, PCT_COLUMN};
