mod artifact_store;
mod models;
mod tabular;

pub use artifact_store::{ArtifactStore, StoreError, StoreSettings, StoreStats};
pub use models::{ExpectationOutcome, RuleResult, ValidationResultDetail, PARTIAL_UNEXPECTED_LIMIT};
pub use tabular::{CellValue, Column, Dataset, TabularError};
