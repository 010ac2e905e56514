//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Briefdaemon - Earnings Brief Scheduler
#[derive(Parser)]
#[command(
    name = "bd",
    about = "Scheduled earnings-brief pipeline over channel uploads",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/briefdaemon/logs/briefdaemon.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Start the daemon in the background
    Start {
        /// Don't fork to background (run in foreground)
        #[arg(long)]
        foreground: bool,
    },

    /// Stop the running daemon
    Stop,

    /// Show daemon status and the active schedule
    Status {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Run one pipeline cycle immediately (for development/testing)
    Run {
        /// Recipient email address for the briefs
        recipient: String,
    },

    /// Show or change the recurring schedule
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommand,
    },

    /// Show the recent activity log
    Log {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        lines: usize,

        /// Clear the log instead of showing it
        #[arg(long)]
        clear: bool,
    },

    /// Internal: Run as daemon process (used by `start`)
    #[command(hide = true)]
    RunDaemon,
}

/// Schedule subcommands
#[derive(Subcommand)]
pub enum ScheduleCommand {
    /// Show the current schedule
    Show {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Replace the schedule with a new recurring one
    Set {
        /// Recipient email address for the briefs
        recipient: String,

        /// Schedule mode (interval, daily)
        #[arg(short, long, default_value = "interval")]
        mode: String,

        /// Interval length (interval mode)
        #[arg(short = 'n', long, default_value = "1")]
        every: u32,

        /// Interval unit (minute, hour)
        #[arg(short, long, default_value = "hour")]
        unit: String,

        /// Time of day in UTC, HH:MM (daily mode)
        #[arg(short, long, default_value = "08:00")]
        at: String,
    },

    /// Deactivate the schedule
    Cancel,
}

/// Output format for status/schedule commands
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["bd"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_start() {
        let cli = Cli::parse_from(["bd", "start"]);
        assert!(matches!(cli.command, Some(Command::Start { foreground: false })));
    }

    #[test]
    fn test_cli_parse_start_foreground() {
        let cli = Cli::parse_from(["bd", "start", "--foreground"]);
        assert!(matches!(cli.command, Some(Command::Start { foreground: true })));
    }

    #[test]
    fn test_cli_parse_stop() {
        let cli = Cli::parse_from(["bd", "stop"]);
        assert!(matches!(cli.command, Some(Command::Stop)));
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::parse_from(["bd", "status"]);
        assert!(matches!(cli.command, Some(Command::Status { .. })));
    }

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["bd", "run", "desk@example.com"]);
        if let Some(Command::Run { recipient }) = cli.command {
            assert_eq!(recipient, "desk@example.com");
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parse_schedule_set_defaults() {
        let cli = Cli::parse_from(["bd", "schedule", "set", "desk@example.com"]);
        if let Some(Command::Schedule {
            command: ScheduleCommand::Set { recipient, mode, every, unit, at },
        }) = cli.command
        {
            assert_eq!(recipient, "desk@example.com");
            assert_eq!(mode, "interval");
            assert_eq!(every, 1);
            assert_eq!(unit, "hour");
            assert_eq!(at, "08:00");
        } else {
            panic!("Expected Schedule Set command");
        }
    }

    #[test]
    fn test_cli_parse_schedule_daily() {
        let cli = Cli::parse_from([
            "bd", "schedule", "set", "desk@example.com", "--mode", "daily", "--at", "06:30",
        ]);
        if let Some(Command::Schedule {
            command: ScheduleCommand::Set { mode, at, .. },
        }) = cli.command
        {
            assert_eq!(mode, "daily");
            assert_eq!(at, "06:30");
        } else {
            panic!("Expected Schedule Set command");
        }
    }

    #[test]
    fn test_cli_parse_schedule_cancel() {
        let cli = Cli::parse_from(["bd", "schedule", "cancel"]);
        assert!(matches!(
            cli.command,
            Some(Command::Schedule { command: ScheduleCommand::Cancel })
        ));
    }

    #[test]
    fn test_cli_parse_log() {
        let cli = Cli::parse_from(["bd", "log", "--lines", "20"]);
        if let Some(Command::Log { lines, clear }) = cli.command {
            assert_eq!(lines, 20);
            assert!(!clear);
        } else {
            panic!("Expected Log command");
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("invalid".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["bd", "-c", "/path/to/config.yml", "status"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
    }
}
