//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::FilterChange;
use crate::view::Section;
use clap::Parser;
use std::path::PathBuf;

/// Cadastats - land-tenure survey dashboard
///
/// Loads the JSON extracts of the cadastral survey project, aggregates
/// them per commune, region, period and topographer, and writes a
/// Markdown or JSON report of the requested dashboard sections.
///
/// Examples:
///   cadastats --source ./data
///   cadastats --source https://example.org/extracts --section parcelles --commune Bala
///   cadastats --section topo --date-start 2025-01-01 --date-end 2025-03-31 --format json
///   cadastats --offline --output demo.md
///   cadastats --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Base URL or directory holding the JSON extracts
    #[arg(short, long, value_name = "URL|DIR", env = "CADASTATS_SOURCE")]
    pub source: Option<String>,

    /// Dashboard sections to render (repeatable, default: all)
    #[arg(long = "section", value_name = "SECTION")]
    pub sections: Vec<Section>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .cadastats.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Only keep parcels / topo entries of this commune
    #[arg(long, value_name = "NAME")]
    pub commune: Option<String>,

    /// NICAD status filter (Oui / Non)
    #[arg(long, value_name = "STATUS")]
    pub nicad: Option<String>,

    /// Deliberation status filter (Oui / Non)
    #[arg(long, value_name = "STATUS")]
    pub deliberee: Option<String>,

    /// First day of the topo date range (YYYY-MM-DD, inclusive)
    #[arg(long, value_name = "DATE")]
    pub date_start: Option<String>,

    /// Last day of the topo date range (YYYY-MM-DD, inclusive)
    #[arg(long, value_name = "DATE")]
    pub date_end: Option<String>,

    /// Topographer full name filter ("Prénom Nom")
    #[arg(long, value_name = "NAME")]
    pub topographe: Option<String>,

    /// Parcel geometry kind filter (e.g. Polygon)
    #[arg(long, value_name = "KIND")]
    pub geometrie: Option<String>,

    /// Rows kept in ranking tables
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Attempts per resource before serving fallback data
    #[arg(long, value_name = "COUNT")]
    pub retries: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Overall deadline per resource in seconds, retries included
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// Do not fetch anything; render synthetic fallback data
    #[arg(long)]
    pub offline: bool,

    /// Exit with code 2 when any section rendered fallback data
    #[arg(long)]
    pub strict: bool,

    /// Leave commune map markers out of the report
    #[arg(long)]
    pub no_map: bool,

    /// Persist the report font size preference
    #[arg(long, value_name = "PX")]
    pub font_size: Option<u32>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .cadastats.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
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

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.top == Some(0) {
            return Err("--top must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.font_size == Some(0) {
            return Err("Font size must be at least 1".to_string());
        }

        for (flag, value) in [
            ("--date-start", &self.date_start),
            ("--date-end", &self.date_end),
        ] {
            if let Some(date) = value {
                if chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
                    return Err(format!("{} must be an ISO date (YYYY-MM-DD): {}", flag, date));
                }
            }
        }

        Ok(())
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

    /// Sections to render, all of them when none was requested.
    pub fn effective_sections(&self) -> Vec<Section> {
        if self.sections.is_empty() {
            Section::ALL.to_vec()
        } else {
            self.sections.clone()
        }
    }

    /// Filters requested on the command line, as user filter actions so
    /// the dashboard validates them like any other change.
    pub fn filter_changes(&self) -> Vec<FilterChange> {
        vec![
            FilterChange::Commune(self.commune.clone()),
            FilterChange::Nicad(self.nicad.clone()),
            FilterChange::Deliberee(self.deliberee.clone()),
            FilterChange::DateRange {
                start: self.date_start.clone(),
                end: self.date_end.clone(),
            },
            FilterChange::Topographe(self.topographe.clone()),
            FilterChange::Geometrie(self.geometrie.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            source: Some("data".to_string()),
            sections: vec![],
            output: None,
            format: OutputFormat::Markdown,
            config: None,
            commune: None,
            nicad: None,
            deliberee: None,
            date_start: None,
            date_end: None,
            topographe: None,
            geometrie: None,
            top: None,
            retries: None,
            timeout: None,
            deadline: None,
            offline: false,
            strict: false,
            no_map: false,
            font_size: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_default_sections() {
        let args = make_args();
        assert_eq!(args.effective_sections(), Section::ALL.to_vec());

        let mut args = make_args();
        args.sections = vec![Section::Topo];
        assert_eq!(args.effective_sections(), vec![Section::Topo]);
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_bad_date() {
        let mut args = make_args();
        args.date_start = Some("01/05/2025".to_string());
        assert!(args.validate().is_err());

        args.date_start = Some("2025-05-01".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "cadastats",
            "--section",
            "parcelles",
            "--section",
            "genre",
            "--commune",
            "Bala",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(args.sections, vec![Section::Parcelles, Section::Genre]);
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(
            args.filter_changes()[0],
            FilterChange::Commune(Some("Bala".to_string()))
        );
    }
}
