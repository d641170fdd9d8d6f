//! Bridge configuration.
//!
//! Settings are layered, lowest to highest precedence:
//!
//! 1. built-in defaults ([`BridgeConfig::default`])
//! 2. an optional YAML file (`--config PATH` or `JVBRIDGE_CONFIG`)
//! 3. `JV_*` environment variables
//! 4. positional command-line arguments (dataspec, fromdate, option)
//!
//! Environment parsing is lenient: empty values are ignored and values that do
//! not parse fall through to the lower layer. A YAML file that does not parse
//! is an error, since it was asked for explicitly.
//!
//! ```rust
//! use jvbridge::config::{BridgeConfig, ConfigLayer};
//!
//! let mut config = BridgeConfig::default();
//! config.apply(ConfigLayer::from_yaml_str("dataspec: DIFF\nread_max_wait_sec: 5")?);
//! config.apply(ConfigLayer::from_lookup(|key| (key == "JV_OPTION").then(|| "4".to_string())));
//!
//! assert_eq!(config.dataspec, "DIFF");
//! assert_eq!(config.option, 4);
//! # Ok::<(), jvbridge::BridgeError>(())
//! ```

use crate::codec::DEFAULT_CODE_PAGE;
use crate::{BridgeError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable naming a YAML configuration file.
pub const CONFIG_PATH_ENV: &str = "JVBRIDGE_CONFIG";
/// Default COM ProgID of JV-Link.
pub const DEFAULT_PROG_ID: &str = "JVDTLab.JVLink";

/// Resolved settings for one bridge run.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// `JVOpen` dataspec
    pub dataspec: String,
    /// `JVOpen` fromtime (`YYYYMMDDhhmmss`)
    pub fromdate: String,
    /// `JVOpen` option
    pub option: i32,
    /// `JVSetSavePath` argument
    pub save_path: String,
    /// Overall deadline of the read loop
    pub read_max_wait: Duration,
    /// Sleep between reads that returned "not ready"
    pub read_interval: Duration,
    /// Settle delay after `JVOpen`
    pub sleep_after_open: Duration,
    pub enable_ui_properties: bool,
    pub enable_status_poll: bool,
    pub status_poll_max_wait: Duration,
    pub status_poll_interval: Duration,
    /// Skip the read unless a status poll returned 0
    pub require_status_zero: bool,
    /// Code page used to decode read buffers
    pub text_code_page: u32,
    pub debug: bool,
    pub prog_id: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            dataspec: "RACE".to_string(),
            fromdate: "20240101000000".to_string(),
            option: 1,
            save_path: r"C:\ProgramData\JRA-VAN\Data".to_string(),
            read_max_wait: Duration::from_secs(60),
            read_interval: Duration::from_millis(500),
            sleep_after_open: Duration::from_secs(1),
            enable_ui_properties: false,
            enable_status_poll: false,
            status_poll_max_wait: Duration::from_secs(10),
            status_poll_interval: Duration::from_millis(500),
            require_status_zero: false,
            text_code_page: DEFAULT_CODE_PAGE,
            debug: false,
            prog_id: DEFAULT_PROG_ID.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Overlay every value `layer` sets.
    pub fn apply(&mut self, layer: ConfigLayer) {
        if let Some(v) = layer.dataspec {
            self.dataspec = v;
        }
        if let Some(v) = layer.fromdate {
            self.fromdate = v;
        }
        if let Some(v) = layer.option {
            self.option = v;
        }
        if let Some(v) = layer.save_path {
            self.save_path = v;
        }
        if let Some(v) = layer.read_max_wait_sec.and_then(seconds) {
            self.read_max_wait = v;
        }
        if let Some(v) = layer.read_interval_sec.and_then(seconds) {
            self.read_interval = v;
        }
        if let Some(v) = layer.sleep_after_open_sec.and_then(seconds) {
            self.sleep_after_open = v;
        }
        if let Some(v) = layer.enable_ui_properties {
            self.enable_ui_properties = v;
        }
        if let Some(v) = layer.enable_status_poll {
            self.enable_status_poll = v;
        }
        if let Some(v) = layer.status_poll_max_wait_sec.and_then(seconds) {
            self.status_poll_max_wait = v;
        }
        if let Some(v) = layer.status_poll_interval_sec.and_then(seconds) {
            self.status_poll_interval = v;
        }
        if let Some(v) = layer.require_status_zero {
            self.require_status_zero = v;
        }
        if let Some(v) = layer.text_code_page.filter(|cp| *cp > 0) {
            self.text_code_page = v;
        }
        if let Some(v) = layer.debug {
            self.debug = v;
        }
        if let Some(v) = layer.prog_id.filter(|id| !id.is_empty()) {
            self.prog_id = v;
        }
    }

    /// Resolve the full layer stack for this process.
    ///
    /// `config_path` takes precedence over `JVBRIDGE_CONFIG`; `cli` is the
    /// highest layer.
    pub fn load(config_path: Option<&Path>, cli: ConfigLayer) -> Result<Self> {
        Self::load_with(config_path, cli, |key| std::env::var(key).ok())
    }

    /// [`BridgeConfig::load`] with an explicit environment lookup.
    pub fn load_with<F>(config_path: Option<&Path>, cli: ConfigLayer, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let file = config_path
            .map(Path::to_path_buf)
            .or_else(|| non_empty(lookup(CONFIG_PATH_ENV)).map(PathBuf::from));
        if let Some(path) = file {
            debug!(path = %path.display(), "Loading YAML configuration");
            config.apply(ConfigLayer::from_yaml_file(&path)?);
        }

        config.apply(ConfigLayer::from_lookup(&lookup));
        config.apply(cli);
        Ok(config)
    }
}

/// A partial set of settings from one source.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub dataspec: Option<String>,
    pub fromdate: Option<String>,
    pub option: Option<i32>,
    pub save_path: Option<String>,
    pub read_max_wait_sec: Option<f64>,
    pub read_interval_sec: Option<f64>,
    pub sleep_after_open_sec: Option<f64>,
    pub enable_ui_properties: Option<bool>,
    pub enable_status_poll: Option<bool>,
    pub status_poll_max_wait_sec: Option<f64>,
    pub status_poll_interval_sec: Option<f64>,
    pub require_status_zero: Option<bool>,
    pub text_code_page: Option<u32>,
    pub debug: Option<bool>,
    pub prog_id: Option<String>,
}

impl ConfigLayer {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_yaml_ng::from_str(&yaml)
            .map_err(|e| BridgeError::config(format!("{}: {}", path.display(), e)))
    }

    /// Layer read from `JV_*` variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_empty(lookup(key));
        let number = |key: &str| get(key).and_then(|v| v.trim().parse::<f64>().ok());

        Self {
            dataspec: get("JV_DATASPEC"),
            fromdate: get("JV_FROMDATE"),
            option: get("JV_OPTION").and_then(|v| v.trim().parse().ok()),
            save_path: get("JV_SAVE_PATH"),
            read_max_wait_sec: number("JV_READ_MAX_WAIT_SEC"),
            read_interval_sec: number("JV_READ_INTERVAL_SEC"),
            sleep_after_open_sec: number("JV_SLEEP_AFTER_OPEN_SEC"),
            enable_ui_properties: get("JV_ENABLE_UI_PROPERTIES").map(|v| flag(&v)),
            enable_status_poll: get("JV_ENABLE_STATUS_POLL").map(|v| flag(&v)),
            status_poll_max_wait_sec: number("JV_STATUS_POLL_MAX_WAIT_SEC"),
            status_poll_interval_sec: number("JV_STATUS_POLL_INTERVAL_SEC"),
            require_status_zero: get("JV_READ_REQUIRE_STATUS_ZERO").map(|v| flag(&v)),
            text_code_page: get("JV_TEXT_ENCODING")
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|cp| *cp > 0)
                .and_then(|cp| u32::try_from(cp).ok()),
            debug: get("JVBRIDGE_DEBUG").map(|v| flag(&v)),
            prog_id: get("JV_PROG_ID"),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Seconds as a duration. Negative values clamp to zero; NaN and infinity are ignored.
fn seconds(value: f64) -> Option<Duration> {
    if value.is_nan() {
        return None;
    }
    Duration::try_from_secs_f64(value.max(0.0)).ok()
}
