//! Command-line arguments.

use crate::config::ConfigLayer;
use clap::Parser;
use std::path::PathBuf;

/// Invoke JV-Link in an isolated process and print one JSON result line.
#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(name = "jvbridge", version)]
pub struct Cli {
    /// `JVOpen` dataspec (for example `RACE`)
    #[arg(value_name = "DATASPEC")]
    pub dataspec: Option<String>,
    /// `JVOpen` fromtime as `YYYYMMDDhhmmss`
    #[arg(value_name = "FROMDATE")]
    pub fromdate: Option<String>,
    /// `JVOpen` option; ignored unless it is an integer
    #[arg(value_name = "OPTION", allow_hyphen_values = true)]
    pub option: Option<String>,
    /// YAML configuration file (overrides `JVBRIDGE_CONFIG`)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Settings given on the command line, as the highest configuration layer.
    pub fn overrides(&self) -> ConfigLayer {
        ConfigLayer {
            dataspec: self.dataspec.clone(),
            fromdate: self.fromdate.clone(),
            option: self.option.as_deref().and_then(|v| v.trim().parse().ok()),
            ..ConfigLayer::default()
        }
    }
}
