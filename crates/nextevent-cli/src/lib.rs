//! CLI, configuration loading, daemon orchestration
//!
//! This crate provides the `nextevent` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use config::AppConfig;
pub use error::{ClientError, ClientResult};
