//! Core types for the bridge result.

mod result;

pub use result::{
    AttemptInfo, BridgeResult, OpenInfo, ReadInfo, SetupInfo, StatusSnapshot, preview,
};

use serde::Serialize;
use std::fmt;

/// Phase of the session the bridge is in.
///
/// When a phase fails, its marker is what the result reports, even though
/// `Close` still runs afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Open,
    StatusPoll,
    Read,
    Close,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Open => "open",
            Stage::StatusPoll => "status_poll",
            Stage::Read => "read",
            Stage::Close => "close",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
