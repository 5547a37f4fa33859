//! Tally CLI - Command-line interface for batch database migrations.
//!
//! This crate provides the `tally` binary along with the pieces it is built
//! from, so a project can embed the same commands with its own registered
//! Rust migrations.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
