//! CLI command definitions

use clap::Args;

/// Build a graph and run it
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to graph YAML file
    #[arg(short, long)]
    pub file: String,

    /// Input overrides (label.input=value)
    #[arg(long, value_parser = parse_key_value)]
    pub set: Vec<(String, String)>,

    /// Number of externally triggered passes to run
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub passes: u32,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Validate a graph description
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to graph YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List registered operations
#[derive(Debug, Args, Clone)]
pub struct OperationsCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 || parts[0].is_empty() {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}
