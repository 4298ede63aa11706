//! CLI command handlers.

pub mod experiment;
pub mod run;
pub mod trigger;
