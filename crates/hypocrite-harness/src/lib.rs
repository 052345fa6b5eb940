//! Test runner for hypocrite suites.
//!
//! This crate provides:
//! - Runner: sequential per-test lifecycle with the PASS/FAIL stream
//! - Config: environment-driven run settings
//! - Structured log: JSONL run trace and its validator
//! - Selftest: a built-in suite driving the whole runtime

#![forbid(unsafe_code)]

pub mod config;
pub mod runner;
pub mod selftest;
pub mod structured_log;

pub use config::RunConfig;
pub use runner::{
    RunError, RunSummary, TestCase, TestOutcome, TestPhase, TestRunner, TestSuite, Verdict,
};
pub use structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};
