//! Tessel CLI - builds a game client's static assets into the chunked,
//! content-addressed output directory its host runtime loads.
//!
//! - [`cli`] - argument definitions
//! - [`commands`] - `build` and `check`
//! - [`error`] - CLI errors and their miette rendering
//! - [`logger`] - tracing subscriber setup
//! - [`ui`] - status lines and the build summary

pub mod cli;
pub mod commands;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result};
