//! tracelink library - Trace requirements to tests and measure coverage
//!
//! Exposes configuration loading and report rendering for the CLI and for
//! embedding.

pub mod config;
pub mod output;
