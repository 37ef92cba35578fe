//! `vesselstudy` command line: pipeline runs, reference data, retiming and
//! verification studies.

pub mod cli;
pub mod commands;
pub mod output;

pub use cli::{Cli, Commands, OutputFormat, VerifyCommands};
pub use commands::execute;
pub use output::print_output;
