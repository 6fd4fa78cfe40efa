//! Command-line argument parsing for db-parity.

use crate::compare::{ClassifierKind, CompareMode, FailurePolicy};
use crate::config::CompareConfig;
use clap::Parser;
use std::path::PathBuf;

/// Report format for inconsistencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable blocks.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}. Expected: text or json")),
        }
    }
}

/// Runs the same SQL against two data sources and reports every statement
/// whose outcomes differ.
#[derive(Parser, Debug)]
#[command(name = "parity")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// First source: connection URL or name from the config file
    #[arg(value_name = "SOURCE_A", env = "PARITY_SOURCE_A")]
    pub source_a: String,

    /// Second source: connection URL or name from the config file
    #[arg(value_name = "SOURCE_B", env = "PARITY_SOURCE_B")]
    pub source_b: String,

    /// SQL file with statements separated by ';' (use "-" for stdin)
    #[arg(short = 'f', long, value_name = "PATH", default_value = "-")]
    pub file: String,

    /// Compare rows regardless of order
    #[arg(short = 'u', long)]
    pub unordered: bool,

    /// Treat two failures as consistent only if their messages match
    #[arg(long)]
    pub strict_failures: bool,

    /// Statement classifier: lexical or parser
    #[arg(long, value_name = "KIND")]
    pub classifier: Option<ClassifierKind>,

    /// Fail any read returning more than this many rows
    #[arg(long, value_name = "N")]
    pub max_rows: Option<usize>,

    /// Pool size per source (overrides the config file)
    #[arg(long, value_name = "N")]
    pub max_connections: Option<u32>,

    /// Report format: text or json
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output_file: Option<PathBuf>,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log every statement and warehouse row
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::Config::default_path)
    }

    /// Returns the statement file, or `None` to read stdin.
    pub fn input_path(&self) -> Option<PathBuf> {
        (self.file != "-").then(|| PathBuf::from(&self.file))
    }

    /// Applies command-line flags on top of the configured comparison
    /// settings. Flags only ever tighten or override; an absent flag keeps
    /// the configured value.
    pub fn apply_to(&self, mut compare: CompareConfig) -> CompareConfig {
        if self.unordered {
            compare.mode = CompareMode::Unordered;
        }
        if self.strict_failures {
            compare.failure_policy = FailurePolicy::Strict;
        }
        if let Some(classifier) = self.classifier {
            compare.classifier = classifier;
        }
        if self.max_rows.is_some() {
            compare.max_rows = self.max_rows;
        }
        compare
    }
}
