//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// GradeLens - AI feedback on students' written work
///
/// Keep a class roster, photograph handwritten or printed work, and get
/// grammar, spelling and punctuation feedback per student.
///
/// Examples:
///   gradelens student add "Alex Smith" --grade 4A
///   gradelens student import roster.txt
///   gradelens scan --student "Alex Smith" essay.jpg
///   gradelens report --student "Alex Smith" --format json
///   gradelens init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .gradelens.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the roster and scan history
    #[arg(long, value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Model used for analysis (default: gemini-2.5-flash)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Base URL of the generative language API
    #[arg(long, value_name = "URL", global = true)]
    pub api_base_url: Option<String>,

    /// API key for the analysis service
    ///
    /// Falls back to the API_KEY environment variable.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Manage the class roster
    #[command(subcommand)]
    Student(StudentCommand),

    /// Analyze a photo of a student's work
    Scan {
        /// Student id or name
        #[arg(short, long)]
        student: String,

        /// Image file (jpg, png, webp, heic, gif) or a data: URL
        #[arg(value_name = "IMAGE")]
        image: String,
    },

    /// Show error statistics and scan history for a student
    Report {
        /// Student id or name
        #[arg(short, long)]
        student: String,

        /// Output format (defaults to the config file setting)
        #[arg(long, value_name = "FORMAT")]
        format: Option<OutputFormat>,

        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Include categories with no errors
        #[arg(long)]
        all_categories: bool,
    },

    /// Generate a default .gradelens.toml configuration file
    InitConfig,
}

#[derive(Subcommand, Debug, Clone)]
pub enum StudentCommand {
    /// Add a single student
    Add {
        /// Display name
        name: String,

        /// Grade or class label
        #[arg(short, long)]
        grade: Option<String>,
    },

    /// Add students in bulk, one "Name[, Grade]" per line ("-" reads stdin)
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// List all students
    List,
}

/// Output format for reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The API key from `--api-key`/`GEMINI_API_KEY`, falling back to `API_KEY`.
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_api_key(self.api_key.as_deref(), || std::env::var("API_KEY").ok())
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref url) = self.api_base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        match &self.command {
            Command::Student(StudentCommand::Add { name, .. }) if name.trim().is_empty() => {
                Err("Student name cannot be empty".to_string())
            }
            Command::Scan { student, image } => {
                if student.trim().is_empty() {
                    return Err("A student must be selected before scanning".to_string());
                }
                if image.trim().is_empty() {
                    return Err("An image is required before scanning".to_string());
                }
                if self.resolved_api_key().is_none() {
                    return Err(
                        "Missing API key: set GEMINI_API_KEY or pass --api-key".to_string()
                    );
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

/// First non-blank key of `explicit` and `fallback`, trimmed.
fn resolve_api_key(
    explicit: Option<&str>,
    fallback: impl FnOnce() -> Option<String>,
) -> Option<String> {
    let non_blank = |k: &str| Some(k.trim().to_string()).filter(|k| !k.is_empty());

    explicit
        .and_then(non_blank)
        .or_else(|| fallback().as_deref().and_then(non_blank))
}
