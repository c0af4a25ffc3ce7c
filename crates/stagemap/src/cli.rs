//! Command-line argument parsing.

use clap::{ArgAction, Parser, Subcommand};
use position_map::{Bias, Position};
use std::path::PathBuf;

/// Trace positions through multi-stage transformation chains
#[derive(Parser, Debug, Clone)]
#[command(name = "stagemap")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Verbose output (repeat for more)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Show timing information
    #[arg(long, global = true)]
    pub timings: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Map positions through the chain described by a manifest
    Trace {
        /// Path to the chain manifest
        #[arg(short, long, default_value = "stagemap.json")]
        manifest: PathBuf,

        /// Position to trace, as LINE:COLUMN (repeatable)
        #[arg(long = "at", required = true, value_name = "LINE:COLUMN")]
        at: Vec<String>,

        /// Trace from the original document to the final output
        #[arg(long)]
        forward: bool,

        /// Positions are 1-based
        #[arg(long)]
        one_based: bool,

        /// Tie-breaking rule for positions between tokens
        #[arg(long)]
        bias: Option<BiasArg>,
    },

    /// Flatten the chain described by a manifest into a single map
    Compose {
        /// Path to the chain manifest
        #[arg(short, long, default_value = "stagemap.json")]
        manifest: PathBuf,

        /// Write the composed map here instead of stdout
        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },

    /// Print the segments of a map file
    Inspect {
        /// Path to a v3 source map
        map: PathBuf,

        /// Only print this generated line (0-based)
        #[arg(long)]
        line: Option<u32>,
    },
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// One JSON object per line
    Json,
}

/// Lookup bias as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BiasArg {
    /// Nearest token at or before the position
    Preceding,
    /// Nearest token at or after the position
    Following,
}

impl From<BiasArg> for Bias {
    fn from(bias: BiasArg) -> Self {
        match bias {
            BiasArg::Preceding => Bias::NearestPreceding,
            BiasArg::Following => Bias::NearestFollowing,
        }
    }
}

impl Args {
    /// Get the default log filter for the requested verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Parse a `LINE:COLUMN` pair, converting 1-based input to 0-based.
pub fn parse_position(text: &str, one_based: bool) -> Result<Position, String> {
    let (line, column) = text
        .trim()
        .split_once(':')
        .ok_or_else(|| format!("expected LINE:COLUMN, got `{text}`"))?;
    let line: u32 = line
        .parse()
        .map_err(|_| format!("invalid line in `{text}`"))?;
    let column: u32 = column
        .parse()
        .map_err(|_| format!("invalid column in `{text}`"))?;
    if one_based {
        Position::from_one_based(line, column)
            .ok_or_else(|| format!("1-based position `{text}` must not contain zero"))
    } else {
        Ok(Position::new(line, column))
    }
}
