mod manager;

pub use manager::{AddExpectationOutcome, SuiteError, SuiteManager};
