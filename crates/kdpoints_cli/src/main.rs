//! kdpoints CLI
//!
//! Command-line tools for inspecting points segments.
//!
//! # Commands
//!
//! - `inspect` - Display a segment's versions, files and field statistics
//! - `verify` - Verify a segment's headers and checksums
//! - `versions` - Print the format version table
//! - `version` - Show version information
//!
//! Field numbers and shapes are not stored by the points files alone, so
//! commands that open fields take them as repeated
//! `--field name:number:dims[:index_dims]:bytes` arguments. Without any,
//! `inspect` and `verify` work on the file level only.

mod commands;
mod fields;

use clap::{Parser, Subcommand};
use fields::FieldSpec;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// kdpoints command-line segment tools.
#[derive(Parser)]
#[command(name = "kdpoints")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the segment directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display segment versions, files and field statistics
    Inspect {
        /// Segment name
        #[arg(short, long)]
        segment: String,

        /// Segment suffix the files were written with
        #[arg(long, default_value = "")]
        suffix: String,

        /// Field description, name:number:dims[:index_dims]:bytes
        #[arg(long = "field")]
        fields: Vec<FieldSpec>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify segment headers and checksums
    Verify {
        /// Segment name
        #[arg(short, long)]
        segment: String,

        /// Segment suffix the files were written with
        #[arg(long, default_value = "")]
        suffix: String,

        /// Field description, name:number:dims[:index_dims]:bytes
        #[arg(long = "field")]
        fields: Vec<FieldSpec>,
    },

    /// Print the format version table
    Versions {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; stdout carries command output
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect {
            segment,
            suffix,
            fields,
            format,
        } => {
            let path = cli.path.ok_or("Segment directory path required for inspect")?;
            commands::inspect::run(&path, &segment, &suffix, &fields, &format)?;
        }
        Commands::Verify {
            segment,
            suffix,
            fields,
        } => {
            let path = cli.path.ok_or("Segment directory path required for verify")?;
            commands::verify::run(&path, &segment, &suffix, &fields)?;
        }
        Commands::Versions { format } => {
            commands::versions::run(&format)?;
        }
        Commands::Version => {
            println!("kdpoints CLI v{}", env!("CARGO_PKG_VERSION"));
            let (format_version, protocol) = kdpoints_format::version::current();
            println!(
                "Points format v{} (BKD protocol {})",
                format_version,
                protocol.get()
            );
        }
    }

    Ok(())
}
