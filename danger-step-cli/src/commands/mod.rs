//! CLI command implementations

pub mod config;
pub mod run;

pub use config::show_config;
pub use run::{InputArgs, RunArgs};
