//! DCABOT — scheduled dollar-cost-averaging buyer.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod engine;
pub mod exchange;
pub mod types;
