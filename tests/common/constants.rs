//! Shared constants for end-to-end tests

// ============================================================================
// Server lifecycle
// ============================================================================

pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Datasets
// ============================================================================

/// Small dataset used by the demo workflow
pub const PEOPLE_CSV: &str = "id,name,age\n1,Ada,36\n2,Grace,45\n3,Linus,28\n";

/// Same shape, but one age is out of range and one name is missing
pub const DIRTY_PEOPLE_CSV: &str = "id,name,age\n1,Ada,36\n2,,45\n3,Linus,212\n";

// ============================================================================
// Basic auth
// ============================================================================

pub const AUTH_USER: &str = "validator";
pub const AUTH_PASS: &str = "hunter2";
