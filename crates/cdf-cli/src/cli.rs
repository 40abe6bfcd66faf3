use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cdf", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    /// Configuration file (defaults to ~/.cdf/config.toml)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the feature table from a raw usage table
    Features {
        /// Raw usage table (.csv or .parquet)
        #[arg(long, value_hint = ValueHint::FilePath)]
        input: PathBuf,
        /// Output feature table (.csv or .parquet)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
        /// Partition columns for hive-style output (comma separated)
        #[arg(long)]
        out_partitions: Option<String>,
        /// Worker threads ("auto" or a number); overrides the config file
        #[arg(long)]
        threads: Option<String>,
        /// Skip the synthetic weather/outage/price columns
        #[arg(long)]
        no_synthetic: bool,
    },
    /// Run an aggregation query or render a dashboard view
    Query {
        /// Feature table (.csv or .parquet)
        #[arg(long, value_hint = ValueHint::FilePath)]
        input: PathBuf,
        /// JSON aggregation request
        #[arg(long, conflicts_with = "view", required_unless_present = "view")]
        request: Option<PathBuf>,
        /// Named dashboard view
        #[arg(long)]
        view: Option<String>,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        resource_type: Option<String>,
        /// Inclusive lower date bound (YYYY-MM-DD)
        #[arg(long)]
        date_start: Option<String>,
        /// Inclusive upper date bound (YYYY-MM-DD)
        #[arg(long)]
        date_end: Option<String>,
        #[arg(long)]
        holiday: Option<bool>,
        /// x-axis metric of the correlation-scatter view
        #[arg(long)]
        x_axis: Option<String>,
        /// y-axis metric of the correlation-scatter view
        #[arg(long)]
        y_axis: Option<String>,
    },
    /// List the dashboard views
    Views,
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
        /// Write output to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write the default configuration
    Init {
        /// Target file (defaults to ~/.cdf/config.toml)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn query_needs_request_or_view() {
        assert!(Cli::try_parse_from(["cdf", "query", "--input", "f.csv"]).is_err());
        assert!(Cli::try_parse_from([
            "cdf", "query", "--input", "f.csv", "--view", "kpis", "--request", "r.json"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["cdf", "query", "--input", "f.csv", "--view", "kpis"]).is_ok());
    }
}
