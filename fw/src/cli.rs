//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// FleetWatch - proxy fleet provisioner and polling daemon
#[derive(Parser)]
#[command(
    name = "fleetwatch",
    about = "Provision a proxy fleet and keep it saturated with watched targets",
    version,
    after_help = "Logs are written to: ~/.local/share/fleetwatch/logs/fleetwatch.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, help = "Log level")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Provision new proxy units
    Create {
        /// How many units to provision
        count: usize,

        /// Regions to round-robin over (comma separated); defaults to the
        /// configured region list
        #[arg(long, value_delimiter = ',')]
        regions: Vec<String>,

        /// Provision one unit at a time instead of batching
        #[arg(long)]
        sequential: bool,
    },

    /// List fleet units
    List {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show fleet status
    Status {
        /// Show per-unit details
        #[arg(short, long)]
        detailed: bool,
    },

    /// Tear down one unit
    Teardown {
        /// Unit id (or service identifier)
        id: String,
    },

    /// Tear down the entire fleet
    TeardownAll {
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Run the polling daemon in the foreground
    Run,
}

/// Output format for list/status commands
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Table,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "table" => Ok(Self::Table),
            _ => Err(format!("Unknown format: {}. Use: text, json, or table", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::Table => write!(f, "table"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_create() {
        let cli = Cli::parse_from(["fw", "create", "3"]);
        assert!(matches!(
            cli.command,
            Command::Create {
                count: 3,
                sequential: false,
                ..
            }
        ));
    }

    #[test]
    fn test_cli_parse_create_with_regions() {
        let cli = Cli::parse_from(["fw", "create", "2", "--regions", "us-east-1,eu-west-1", "--sequential"]);
        match cli.command {
            Command::Create {
                count,
                regions,
                sequential,
            } => {
                assert_eq!(count, 2);
                assert_eq!(regions, vec!["us-east-1", "eu-west-1"]);
                assert!(sequential);
            }
            _ => panic!("Expected Create command"),
        }
    }

    #[test]
    fn test_cli_parse_list_format() {
        let cli = Cli::parse_from(["fw", "list", "--format", "json"]);
        assert!(matches!(
            cli.command,
            Command::List {
                format: OutputFormat::Json
            }
        ));
    }

    #[test]
    fn test_cli_parse_teardown_all_force() {
        let cli = Cli::parse_from(["fw", "teardown-all", "--force"]);
        assert!(matches!(cli.command, Command::TeardownAll { force: true }));
    }

    #[test]
    fn test_output_format_parse() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("csv".parse::<OutputFormat>().is_err());
    }
}
