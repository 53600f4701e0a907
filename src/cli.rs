use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "about-attrib",
    about = "Validate ABOUT provenance records and generate attribution documents",
    version
)]
pub struct Cli {
    /// Config file [default: ./.about-attrib/config.toml, fallback ~/.config/about-attrib/config.toml]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Only print summary line
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate every ABOUT file and check that referenced files exist
    Check {
        /// ABOUT file or directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Report format
        #[arg(long, default_value = "terminal", value_name = "FORMAT")]
        report: ReportFormat,

        /// Also show informational findings
        #[arg(short, long)]
        verbose: bool,
    },

    /// Render an attribution document from ABOUT files
    Attrib {
        /// ABOUT file or directory to scan
        path: PathBuf,

        /// Output file
        output: PathBuf,

        /// Template file; overrides the configured template
        #[arg(long, value_name = "FILE")]
        template: Option<PathBuf>,

        /// Extra template variable as key=value (repeatable)
        #[arg(long, value_name = "KEY=VALUE")]
        vartext: Vec<String>,

        /// License reference directory; overrides the configured one
        #[arg(long, value_name = "DIR")]
        reference: Option<PathBuf>,
    },

    /// Translate license keys to SPDX identifiers and write the records to a new directory
    Translate {
        /// ABOUT file or directory to scan
        path: PathBuf,

        /// Directory receiving the translated records
        output_dir: PathBuf,

        /// Translate SPDX identifiers back to license keys
        #[arg(long)]
        reverse: bool,

        /// JSON table of license key to SPDX identifier; the bundled table otherwise
        #[arg(long, value_name = "FILE")]
        mapping: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}
