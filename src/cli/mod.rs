//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{OperationsCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Incremental dataflow engine for vision processing
#[derive(Debug, Parser, Clone)]
#[command(name = "visionflow")]
#[command(version = "0.1.0")]
#[command(about = "Run incremental vision-processing graphs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Build a graph from YAML and run passes over it
    Run(RunCommand),

    /// Validate a graph description
    Validate(ValidateCommand),

    /// List the available operations
    Operations(OperationsCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
