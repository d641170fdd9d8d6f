//! `jvbridge` binary: one JV-Link session, one JSON line on stdout.

use anyhow::Context;
use clap::Parser;
use clap::error::ErrorKind;
use jvbridge::cli::Cli;
use jvbridge::config::BridgeConfig;
use jvbridge::{Bridge, BridgeError, BridgeResult, Stage, logging};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            let _ = err.print();
            return emit(&BridgeResult::setup_failure(&BridgeError::config(err.to_string())));
        }
    };

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            logging::init(false);
            tracing::error!("{err:#}");
            return emit(&BridgeResult {
                stage: Some(Stage::Init),
                error: Some(format!("{err:#}")),
                ..BridgeResult::default()
            });
        }
    };

    logging::init(config.debug);
    tracing::debug!(?config, "Resolved configuration");

    emit(&Bridge::run(&config))
}

fn load_config(cli: &Cli) -> anyhow::Result<BridgeConfig> {
    BridgeConfig::load(cli.config.as_deref(), cli.overrides())
        .context("failed to load bridge configuration")
}

fn emit(result: &BridgeResult) -> ExitCode {
    println!("{}", result.to_json_line());
    ExitCode::from(result.exit_code())
}
