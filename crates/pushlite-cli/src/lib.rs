//! CLI argument models and validation utilities for the pushlite binary.
//!
//! Exposes the clap-backed `Cli` plus the validation pass run before startup
//! turns flags into gateway configuration.

pub mod cli_args;
pub mod cli_types;
pub mod validation;

pub use cli_args::Cli;
pub use cli_types::*;
pub use validation::*;
