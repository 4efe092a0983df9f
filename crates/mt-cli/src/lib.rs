//! Command-line interface for the metasking activity tracker.
//!
//! Argument definitions live in [`Cli`], configuration in [`Config`] and one
//! module per command group under [`commands`].

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
