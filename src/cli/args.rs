//! Command line argument parsing for the jiten CLI using clap.

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::index::MatchMode;
use crate::search::{SearchField, SearchFlags};

/// Jiten - a compact dictionary lookup engine
#[derive(Parser, Debug, Clone)]
#[command(name = "jiten")]
#[command(about = "Build and query compressed, indexed dictionaries")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct JitenArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl JitenArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build a dictionary from a JSON array of entries
    Build(BuildArgs),

    /// Search a dictionary
    Search(SearchArgs),

    /// Show header, checksum and index information
    Inspect(InspectArgs),
}

/// Arguments for building a dictionary
#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    /// JSON file holding an array of entries
    #[arg(value_name = "ENTRIES_FILE")]
    pub entries_file: PathBuf,

    /// Directory to write the dictionary files into
    #[arg(value_name = "DIRECTORY")]
    pub directory: PathBuf,

    /// Dictionary name
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Dictionary configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE", env = "JITEN_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Directory holding the dictionary files
    #[arg(value_name = "DIRECTORY")]
    pub directory: PathBuf,

    /// Dictionary name
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Query string, e.g. `猫 -猫背` or `"cat's back"`
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Fields to search (comma-separated, default: all fields)
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<FieldArg>,

    /// Match mode
    #[arg(short = 'm', long, default_value = "exact")]
    pub mode: ModeArg,

    /// Maximum number of entries to return
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Dictionary configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE", env = "JITEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verify file checksums before searching
    #[arg(long)]
    pub verify: bool,
}

/// Arguments for inspecting a dictionary
#[derive(Parser, Debug, Clone)]
pub struct InspectArgs {
    /// Directory holding the dictionary files
    #[arg(value_name = "DIRECTORY")]
    pub directory: PathBuf,

    /// Dictionary name
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Dictionary configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE", env = "JITEN_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Searchable fields
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldArg {
    #[value(alias = "h")]
    Headword,
    #[value(alias = "r")]
    Reading,
    #[value(alias = "m")]
    Meaning,
}

impl From<FieldArg> for SearchField {
    fn from(field: FieldArg) -> Self {
        match field {
            FieldArg::Headword => SearchField::Headword,
            FieldArg::Reading => SearchField::Reading,
            FieldArg::Meaning => SearchField::Meaning,
        }
    }
}

/// Match modes
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Exact,
    Prefix,
    Suffix,
    Substring,
}

impl From<ModeArg> for MatchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Exact => MatchMode::Exact,
            ModeArg::Prefix => MatchMode::Prefix,
            ModeArg::Suffix => MatchMode::Suffix,
            ModeArg::Substring => MatchMode::Substring,
        }
    }
}

impl SearchArgs {
    /// Search flags for the selected fields and mode.
    pub fn flags(&self) -> SearchFlags {
        let fields = if self.fields.is_empty() {
            SearchFlags::ALL_FIELDS
        } else {
            self.fields
                .iter()
                .map(|&field| SearchField::from(field).flag())
                .fold(SearchFlags::empty(), |flags, flag| flags | flag)
        };
        SearchFlags::new(fields, self.mode.into())
    }
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_search_command() {
        let args = JitenArgs::try_parse_from([
            "jiten",
            "search",
            "/path/to/dict",
            "jmdict",
            "猫 -猫背",
            "--fields",
            "h,reading",
            "--mode",
            "prefix",
            "--limit",
            "20",
        ])
        .unwrap();

        if let Command::Search(search_args) = args.command {
            assert_eq!(search_args.directory, PathBuf::from("/path/to/dict"));
            assert_eq!(search_args.query, "猫 -猫背");
            assert_eq!(search_args.limit, 20);
            let flags = search_args.flags();
            assert_eq!(flags.match_mode(), MatchMode::Prefix);
            assert!(flags.contains(SearchFlags::HEADWORD | SearchFlags::READING));
            assert!(!flags.contains(SearchFlags::MEANING));
        } else {
            panic!("Expected Search command");
        }
    }

    #[test]
    fn test_search_defaults_to_all_fields_exact() {
        let args = JitenArgs::try_parse_from(["jiten", "search", "d", "n", "cat"]).unwrap();
        let Command::Search(search_args) = args.command else {
            panic!("Expected Search command");
        };
        let flags = search_args.flags();
        assert_eq!(flags.match_mode(), MatchMode::Exact);
        assert!(flags.contains(SearchFlags::ALL_FIELDS));
    }

    #[test]
    fn test_build_command() {
        let args = JitenArgs::try_parse_from([
            "jiten",
            "build",
            "entries.json",
            "out",
            "jmdict",
            "--config",
            "cfg.json",
        ])
        .unwrap();
        let Command::Build(build_args) = args.command else {
            panic!("Expected Build command");
        };
        assert_eq!(build_args.entries_file, PathBuf::from("entries.json"));
        assert_eq!(build_args.name, "jmdict");
        assert_eq!(build_args.config, Some(PathBuf::from("cfg.json")));
    }

    #[test]
    fn test_verbosity_levels() {
        let args = JitenArgs::try_parse_from(["jiten", "inspect", "d", "n"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args = JitenArgs::try_parse_from(["jiten", "-vvv", "inspect", "d", "n"]).unwrap();
        assert_eq!(args.verbosity(), 3);

        let args = JitenArgs::try_parse_from(["jiten", "-q", "-v", "inspect", "d", "n"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_output_format() {
        let args =
            JitenArgs::try_parse_from(["jiten", "--format", "json", "inspect", "d", "n"]).unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
        assert!(JitenArgs::try_parse_from(["jiten", "--format", "yaml", "inspect", "d", "n"]).is_err());
    }
}
