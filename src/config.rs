//! Runtime configuration: CLI flags resolved into an `AppConfig`.

use std::path::PathBuf;

use clap::Parser;

/// Command-line surface, matching the agent's flags one-to-one.
#[derive(Debug, Parser)]
#[command(name = "logfleet", version, about = "Tails and reassembles process logs")]
pub struct Cli {
    /// Port the metrics HTTP server listens on.
    #[arg(long, default_value_t = 2112)]
    pub port: u16,

    /// Deployment environment tag, included in startup logs.
    #[arg(long, default_value = "development")]
    pub env: String,

    /// Node identifier, included on every emitted record.
    #[arg(long, default_value = "")]
    pub node: String,

    /// Root directory to recursively tail.
    #[arg(long)]
    pub logsdir: PathBuf,

    /// Root directory containing per-process instance config directories.
    #[arg(long, default_value = "")]
    pub configdir: String,

    /// Run derived regex formats against accumulated entries and emit field matches.
    #[arg(long, default_value_t = false)]
    pub parse: bool,

    /// Tail from the start of files that already exist at startup, instead of
    /// seeking to end-of-file.
    #[arg(long = "read-existing-logs", default_value_t = false)]
    pub read_existing_logs: bool,
}

/// Resolved runtime configuration, derived from [`Cli`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub env: String,
    pub node: String,
    pub logs_dir: PathBuf,
    pub config_dir: PathBuf,
    pub parse: bool,
    pub read_existing_logs: bool,
    /// Substrings that exclude an otherwise-actionable file from tailing.
    pub skip_files: Vec<String>,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> std::io::Result<Self> {
        let logs_dir = std::fs::canonicalize(&cli.logsdir).unwrap_or(cli.logsdir);
        Ok(Self {
            port: cli.port,
            env: cli.env,
            node: cli.node,
            logs_dir,
            config_dir: PathBuf::from(cli.configdir),
            parse: cli.parse,
            read_existing_logs: cli.read_existing_logs,
            skip_files: default_skip_files(),
        })
    }
}

fn default_skip_files() -> Vec<String> {
    vec!["searchserver-0.log".to_string(), ".gz".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::parse_from(["logfleet", "--logsdir", "/var/logs"]);
        assert_eq!(cli.port, 2112);
        assert_eq!(cli.env, "development");
        assert_eq!(cli.node, "");
        assert!(!cli.parse);
        assert!(!cli.read_existing_logs);
    }

    #[test]
    fn default_skip_files_match_upstream_defaults() {
        let skip = default_skip_files();
        assert_eq!(skip, vec!["searchserver-0.log", ".gz"]);
    }
}
