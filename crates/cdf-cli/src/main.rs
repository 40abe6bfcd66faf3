use std::process::ExitCode;

use anyhow::Result;
use cdf_cli::cli::{Cli, Commands};
use cdf_query::FilterSpec;
use clap::Parser;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod commands;

use crate::commands::features::FeatureArgs;
use crate::commands::query::QueryArgs;
use crate::commands::util::load_config;
use crate::commands::{completions, config, features, query};

fn run(cli: &Cli) -> Result<()> {
    let explicit = cli.config.as_deref();
    match &cli.command {
        Some(Commands::Features {
            input,
            out,
            out_partitions,
            threads,
            no_synthetic,
        }) => {
            let config = load_config(explicit)?;
            features::handle(
                FeatureArgs {
                    input,
                    out,
                    out_partitions: out_partitions.as_ref(),
                    threads: threads.as_deref(),
                    no_synthetic: *no_synthetic,
                },
                config.pipeline,
            )
        }
        Some(Commands::Query {
            input,
            request,
            view,
            region,
            resource_type,
            date_start,
            date_end,
            holiday,
            x_axis,
            y_axis,
        }) => {
            let config = load_config(explicit)?;
            let filters = FilterSpec {
                region: region.clone(),
                resource_type: resource_type.clone(),
                date_start: date_start.clone(),
                date_end: date_end.clone(),
                holiday: *holiday,
                x_axis: x_axis.clone(),
                y_axis: y_axis.clone(),
            };
            query::handle(
                QueryArgs {
                    input,
                    request: request.as_deref(),
                    view: view.as_deref(),
                    filters,
                },
                &config.query,
            )
        }
        Some(Commands::Views) => {
            query::list_views();
            Ok(())
        }
        Some(Commands::Config { command }) => config::handle(command, explicit),
        Some(Commands::Completions { shell, out }) => completions::handle(*shell, out.as_deref()),
        None => {
            eprintln!("no command given; run `cdf --help` for usage");
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install log subscriber: {err}");
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
