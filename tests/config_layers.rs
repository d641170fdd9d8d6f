//! Configuration layering from file, environment and command line.

use clap::Parser;
use jvbridge::cli::Cli;
use jvbridge::config::{BridgeConfig, CONFIG_PATH_ENV};
use std::io::Write;
use std::time::Duration;

fn lookup(pairs: Vec<(&'static str, String)>) -> impl Fn(&str) -> Option<String> {
    move |key| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone())
}

#[test]
fn command_line_beats_environment_beats_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "dataspec: TOKU\nfromdate: '20200101000000'\noption: 3\nread_interval_sec: 0.25\nrequire_status_zero: true\n"
    )
    .unwrap();

    let cli = Cli::try_parse_from(["jvbridge", "RACE", "--config", file.path().to_str().unwrap()]).unwrap();
    let env = lookup(vec![
        ("JV_FROMDATE", "20230101000000".to_string()),
        ("JV_READ_INTERVAL_SEC", "not-a-number".to_string()),
    ]);

    let config = BridgeConfig::load_with(cli.config.as_deref(), cli.overrides(), env).unwrap();

    assert_eq!(config.dataspec, "RACE");
    assert_eq!(config.fromdate, "20230101000000");
    assert_eq!(config.option, 3);
    assert_eq!(config.read_interval, Duration::from_millis(250));
    assert!(config.require_status_zero);
}

#[test]
fn explicit_config_flag_wins_over_environment_path() {
    let mut chosen = tempfile::NamedTempFile::new().unwrap();
    writeln!(chosen, "prog_id: Custom.JVLink").unwrap();

    let env = lookup(vec![(CONFIG_PATH_ENV, "/nonexistent/ignored.yaml".to_string())]);
    let cli = Cli::try_parse_from(["jvbridge", "--config", chosen.path().to_str().unwrap()]).unwrap();

    let config = BridgeConfig::load_with(cli.config.as_deref(), cli.overrides(), env).unwrap();
    assert_eq!(config.prog_id, "Custom.JVLink");
}

#[test]
fn malformed_yaml_is_a_configuration_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "option: [not, an, int]").unwrap();

    let err = BridgeConfig::load_with(Some(file.path()), Default::default(), |_| None).unwrap_err();
    assert!(matches!(err, jvbridge::BridgeError::Config { .. }));
}
