//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use jarcrawler_core::SourceId;

/// Resolve the latest server-jar download URL for every version of each source.
///
/// Without a subcommand, `run` is assumed.
#[derive(Parser, Debug)]
#[command(name = "jarcrawler")]
#[command(author, version, about)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/jarcrawler/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve sources and write their JSON mappings (default)
    Run(RunArgs),
    /// Show available sources, their kind and endpoint
    List,
}

/// Options for a resolution run; each overrides the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Directory for output files
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Source to resolve (repeatable; default: every enabled source)
    #[arg(short = 's', long = "source", value_name = "NAME")]
    pub sources: Vec<SourceId>,

    /// Maximum retries per upstream request after the first attempt (0-9)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(0..=9))]
    pub max_retries: Option<u8>,

    /// Minimum delay between page loads on one scraped host, in milliseconds (0 to disable, max 60000)
    #[arg(short = 't', long, value_name = "MS", value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub throttle: Option<u64>,

    /// Do not write unresolved_<source>.json reports
    #[arg(long)]
    pub no_unresolved: bool,
}

impl Cli {
    /// Run arguments, whether given at top level or after `run`.
    #[must_use]
    pub fn run_args(&self) -> Option<&RunArgs> {
        match &self.command {
            None => Some(&self.run),
            Some(Command::Run(args)) => Some(args),
            Some(Command::List) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let cli = Cli::try_parse_from(["jarcrawler"]).unwrap();
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        assert!(cli.command.is_none());
        let run = cli.run_args().unwrap();
        assert!(run.sources.is_empty());
        assert_eq!(run.max_retries, None);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let cli = Cli::try_parse_from(["jarcrawler", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);

        let cli = Cli::try_parse_from(["jarcrawler", "list", "--verbose"]).unwrap();
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let cli = Cli::try_parse_from(["jarcrawler", "-q"]).unwrap();
        assert!(cli.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Cli::try_parse_from(["jarcrawler", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Cli::try_parse_from(["jarcrawler", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Cli::try_parse_from(["jarcrawler", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_repeatable_source_flag() {
        let cli =
            Cli::try_parse_from(["jarcrawler", "-s", "paper", "--source", "fabric"]).unwrap();
        assert_eq!(
            cli.run_args().unwrap().sources,
            vec![SourceId::Paper, SourceId::Fabric]
        );
    }

    #[test]
    fn test_cli_unknown_source_rejected() {
        let err = Cli::try_parse_from(["jarcrawler", "--source", "quilt"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_run_subcommand_carries_args() {
        let cli = Cli::try_parse_from([
            "jarcrawler",
            "run",
            "-o",
            "out",
            "--max-retries",
            "0",
            "--throttle",
            "250",
        ])
        .unwrap();
        let run = cli.run_args().unwrap();
        assert_eq!(run.output_dir, Some(PathBuf::from("out")));
        assert_eq!(run.max_retries, Some(0));
        assert_eq!(run.throttle, Some(250));
    }

    #[test]
    fn test_cli_list_has_no_run_args() {
        let cli = Cli::try_parse_from(["jarcrawler", "list"]).unwrap();
        assert!(matches!(cli.command, Some(Command::List)));
        assert!(cli.run_args().is_none());
    }

    #[test]
    fn test_cli_max_retries_over_max_rejected() {
        let err = Cli::try_parse_from(["jarcrawler", "-r", "10"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_throttle_over_max_rejected() {
        let err = Cli::try_parse_from(["jarcrawler", "--throttle", "60001"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["jarcrawler", "list", "--config", "c.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
    }
}
