mod runner;

pub use runner::{CheckpointRunner, RunOutcome};
