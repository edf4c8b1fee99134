//! Tool Plan Orchestrator
//!
//! Executes structured tool-execution plans produced by an upstream planner:
//! - Validates plan structure before anything runs
//! - Runs steps under one of four strategies (single, parallel, sequential, hybrid)
//! - Threads `${{name}}` result variables from earlier steps into later ones
//! - Captures per-step failures without aborting sibling work
//! - Aggregates every outcome into one report with an execution log
//!
//! FLOW:
//! INTAKE → VALIDATE → GROUP → RESOLVE → INVOKE → AGGREGATE

pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod grouping;
pub mod intake;
pub mod models;
pub mod resolver;
pub mod tools;
pub mod validation;

#[cfg(test)]
mod testing;

pub use error::Result;

// Re-export common types
pub use execution::ExecutionEngine;
pub use models::*;
