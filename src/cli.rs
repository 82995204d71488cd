use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "tabsearch",
    about = "Ingest CSV and XLSX files and search them by relevance"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ingest a CSV or XLSX file and make it the active file
    Ingest(IngestArgs),
    /// Search the records of one file
    Search(SearchArgs),
    /// Write every match of a query as CSV
    Export(ExportArgs),
    /// Manage ingested files
    Files {
        #[command(subcommand)]
        action: FilesAction,
    },
    /// Show the columns available for searching
    Columns(ColumnsArgs),
    /// Suggest product and company names starting with a prefix
    Suggest(SuggestArgs),
    /// Manage persistent settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Ingest --

#[derive(Debug, Parser)]
pub struct IngestArgs {
    /// Path to a .csv or .xlsx file
    pub path: PathBuf,

    /// Rows written per batch (overrides the batch_size setting)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Do not draw a progress bar
    #[arg(long)]
    pub no_progress: bool,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Search terms, separated by whitespace; every term must match
    pub query: String,

    /// Field to search (repeatable); a term matches if any field contains it
    #[arg(short = 'f', long = "field")]
    pub fields: Vec<String>,

    /// File to search (defaults to the active file)
    #[arg(long)]
    pub file: Option<u64>,

    /// Page number, starting at 1
    #[arg(short, long, default_value = "1")]
    pub page: usize,

    /// Results per page (overrides the page_size setting)
    #[arg(short = 'n', long)]
    pub page_size: Option<usize>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Export --

#[derive(Debug, Parser)]
pub struct ExportArgs {
    /// Search terms, separated by whitespace; every term must match
    pub query: String,

    /// Field to search (repeatable)
    #[arg(short = 'f', long = "field")]
    pub fields: Vec<String>,

    /// File to export from (defaults to the active file)
    #[arg(long)]
    pub file: Option<u64>,

    /// Write to this path instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

// -- Files subcommands --

#[derive(Debug, Subcommand)]
pub enum FilesAction {
    /// List ingested files, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Make a file the active search target
    Select {
        /// File id
        id: u64,
    },
    /// Delete a file and all of its records
    Delete {
        /// File id
        id: u64,
    },
}

// -- Columns --

#[derive(Debug, Parser)]
pub struct ColumnsArgs {
    /// File to inspect (defaults to the active file)
    #[arg(long)]
    pub file: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Suggest --

#[derive(Debug, Parser)]
pub struct SuggestArgs {
    /// Prefix to complete (at least two characters)
    pub prefix: String,

    /// File to look in (defaults to the active file)
    #[arg(long)]
    pub file: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Config subcommands --

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Show every setting and whether it is stored or a default
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Persist a setting (batch_size, page_size or weights)
    Set {
        /// Setting name
        key: String,
        /// New value
        value: String,
    },
    /// Remove a stored setting (revert to default)
    Clear {
        /// Setting name
        key: String,
    },
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "tabsearch",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_search_defaults() {
        let cli = Cli::parse_from([
            "tabsearch", "search", "blue widget", "-f", "Product", "--field",
            "Company",
        ]);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.query, "blue widget");
                assert_eq!(args.fields, vec!["Product", "Company"]);
                assert_eq!(args.file, None);
                assert_eq!(args.page, 1);
                assert_eq!(args.page_size, None);
                assert!(!args.json);
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn parse_files_select() {
        let cli = Cli::parse_from(["tabsearch", "files", "select", "3"]);
        match cli.command {
            Command::Files {
                action: FilesAction::Select { id },
            } => assert_eq!(id, 3),
            _ => panic!("expected files select"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "tabsearch",
            "columns",
            "--data-dir",
            "/tmp/x",
            "-vv",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
    }
}
