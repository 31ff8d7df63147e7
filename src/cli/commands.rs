//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: process every title with locked achievements (default)
//! - scan: build the library snapshot from the web API
//! - locate: find the client library
//! - titles: list candidate titles from the snapshot
//! - preview: show classifier verdicts for one title

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Unlockr - bulk achievement processing engine
#[derive(Parser, Debug)]
#[command(name = "unlockr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Unlock eligible achievements for every title in the snapshot
    Run {
        /// Library snapshot (defaults to client.snapshot_path)
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Maximum titles processed at once
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Do not probe for the client library
        #[arg(long)]
        skip_discovery: bool,

        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build the library snapshot from the web API
    Scan {
        /// Where to write the snapshot (defaults to client.snapshot_path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Requests in flight at once
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },

    /// Locate the client library and its companions
    Locate,

    /// List titles with locked achievements
    Titles {
        /// Library snapshot (defaults to client.snapshot_path)
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },

    /// Show how each achievement of a title would be classified
    Preview {
        /// Title (app) id
        app_id: u32,

        /// Library snapshot (defaults to client.snapshot_path)
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },
}

impl Commands {
    /// The command used when none is given
    pub fn default_run() -> Self {
        Commands::Run {
            snapshot: None,
            concurrency: None,
            skip_discovery: false,
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_no_args() {
        // No args falls back to a default run
        let cli = Cli::try_parse_from(["unlockr"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["unlockr", "-v"]).unwrap();
        assert!(cli.is_verbose());
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["unlockr", "-c", "/path/to/unlockr.yml"]).unwrap();
        assert_eq!(cli.config.as_ref(), Some(&PathBuf::from("/path/to/unlockr.yml")));
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["unlockr", "run"]).unwrap();
        assert_eq!(cli.command, Some(Commands::default_run()));
    }

    #[test]
    fn test_run_with_options() {
        let cli = Cli::try_parse_from([
            "unlockr",
            "run",
            "--snapshot",
            "games.json",
            "-j",
            "2",
            "--skip-discovery",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Run {
                snapshot,
                concurrency,
                skip_discovery,
                json,
            }) => {
                assert_eq!(snapshot, Some(PathBuf::from("games.json")));
                assert_eq!(concurrency, Some(2));
                assert!(skip_discovery);
                assert!(json);
            }
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_run_rejects_non_numeric_concurrency() {
        assert!(Cli::try_parse_from(["unlockr", "run", "-j", "many"]).is_err());
    }

    #[test]
    fn test_scan_options() {
        let cli = Cli::try_parse_from(["unlockr", "scan"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Scan {
                output: None,
                concurrency: None
            })
        );

        let cli = Cli::try_parse_from(["unlockr", "scan", "-o", "library.json", "-j", "16"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Scan {
                output: Some(PathBuf::from("library.json")),
                concurrency: Some(16)
            })
        );
    }

    #[test]
    fn test_locate() {
        let cli = Cli::try_parse_from(["unlockr", "locate"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Locate));
    }

    #[test]
    fn test_titles_with_snapshot() {
        let cli = Cli::try_parse_from(["unlockr", "titles", "-s", "data.json"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Titles {
                snapshot: Some(PathBuf::from("data.json"))
            })
        );
    }

    #[test]
    fn test_preview_requires_app_id() {
        assert!(Cli::try_parse_from(["unlockr", "preview"]).is_err());

        let cli = Cli::try_parse_from(["unlockr", "preview", "440"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Preview {
                app_id: 440,
                snapshot: None
            })
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["unlockr", "titles", "--verbose", "--config", "x.yml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("x.yml")));
    }

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }
}
