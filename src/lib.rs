//! MCP tool server exposing CSV data-validation workflows: load a dataset,
//! build an expectation suite, run a checkpoint and fetch its result.

pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod ingestion;
pub mod mcp;
pub mod server;
pub mod services;
pub mod store;
pub mod suites;
