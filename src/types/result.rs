//! The structured result emitted on stdout.
//!
//! Field names serialize in snake_case and `None` fields are omitted, so a run
//! that never reached a stage simply has no key for it.

use super::Stage;
use crate::error::{BridgeError, format_hresult};
use crate::link::{OpenOutcome, OpenRequest, ReadOutcome};
use serde::Serialize;

const READ_HEAD_CHARS: usize = 200;
const ATTEMPT_HEAD_CHARS: usize = 30;
const ATTEMPT_PREVIEW_CHARS: usize = 200;
const ARGS_PREVIEW_CHARS: usize = 50;

/// Everything the bridge learned during one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BridgeResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hresult: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_properties_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<SetupInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<OpenInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_poll: Option<Vec<StatusSnapshot>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<ReadInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<i32>,
}

impl BridgeResult {
    /// Record `err` as the run's error, with its HRESULT when it has one.
    pub fn record_error(&mut self, err: &BridgeError) {
        self.error = Some(error_chain(err));
        self.hresult = err.hresult().map(format_hresult);
    }

    /// Result for a run that failed before any JV-Link call was made.
    pub fn setup_failure(err: &BridgeError) -> Self {
        let mut result = Self { stage: Some(Stage::Init), ..Self::default() };
        result.record_error(err);
        result
    }

    /// Compact single-line JSON.
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            format!(
                "{{\"ok\":false,\"error\":{}}}",
                serde_json::Value::String(format!("result serialization failed: {err}"))
            )
        })
    }

    /// Process exit code: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.ok { 0 } else { 1 }
    }
}

/// Return codes of the setup calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SetupInfo {
    pub init: i32,
    pub save_path: i32,
    pub save_flag: i32,
    pub pay_flag: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_properties: Option<i32>,
}

/// `JVOpen` inputs, return code and outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OpenInfo {
    pub dataspec: String,
    pub fromdate: String,
    pub option: i32,
    pub ret: i32,
    pub readcount: i32,
    pub downloadcount: i32,
    pub lastfiletimestamp: String,
}

impl OpenInfo {
    pub fn new(request: &OpenRequest<'_>, outcome: OpenOutcome) -> Self {
        Self {
            dataspec: request.dataspec.to_string(),
            fromdate: request.fromdate.to_string(),
            option: request.option,
            ret: outcome.ret,
            readcount: outcome.readcount,
            downloadcount: outcome.downloadcount,
            lastfiletimestamp: outcome.lastfiletimestamp,
        }
    }
}

/// One `JVStatus` poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub timestamp: String,
    pub status: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hresult: Option<String>,
}

impl StatusSnapshot {
    pub fn observed(timestamp: String, status: i32) -> Self {
        Self { timestamp, status, error: None, hresult: None }
    }

    pub fn failed(timestamp: String, status: i32, err: &BridgeError) -> Self {
        Self {
            timestamp,
            status,
            error: Some(error_chain(err)),
            hresult: err.hresult().map(format_hresult),
        }
    }
}

/// Outcome of the read stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadInfo {
    pub found: bool,
    pub ret: i32,
    pub size: i32,
    pub filename: String,
    pub buff_head: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_error: Option<String>,
    pub attempt_count: usize,
    pub attempts_tail: Vec<AttemptInfo>,
}

impl ReadInfo {
    /// Summary built from the last completed attempt, if any.
    pub fn new(
        found: bool,
        ret: i32,
        last: Option<&ReadOutcome>,
        attempt_count: usize,
        attempts_tail: Vec<AttemptInfo>,
    ) -> Self {
        match last {
            Some(outcome) => Self {
                found,
                ret,
                size: outcome.size,
                filename: outcome.filename.clone(),
                buff_head: preview(&outcome.text, READ_HEAD_CHARS),
                decode_error: outcome.decode_error.clone(),
                attempt_count,
                attempts_tail,
            },
            None => Self { found, ret, attempt_count, attempts_tail, ..Self::default() },
        }
    }
}

/// Diagnostics for one `JVRead` attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttemptInfo {
    pub ret: i32,
    pub size: i32,
    pub filename: String,
    pub buff_head: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<usize>,
    pub read_args_types: Vec<String>,
    pub read_args_values_preview: Vec<String>,
}

impl AttemptInfo {
    pub fn from_outcome(outcome: &ReadOutcome, read_args_types: Vec<String>) -> Self {
        Self {
            ret: outcome.ret,
            size: outcome.size,
            filename: outcome.filename.clone(),
            buff_head: preview(&outcome.text, ATTEMPT_HEAD_CHARS),
            buffer_preview: Some(preview(&outcome.text, ATTEMPT_PREVIEW_CHARS)),
            decode_error: outcome.decode_error.clone(),
            truncated: outcome.truncated,
            read_args_types,
            read_args_values_preview: args_preview(outcome.size, &outcome.filename, &outcome.text),
        }
    }

    /// Attempt whose call faulted before producing any output.
    pub fn faulted(ret: i32, read_args_types: Vec<String>) -> Self {
        Self { ret, read_args_types, read_args_values_preview: args_preview(0, "", ""), ..Self::default() }
    }
}

fn args_preview(size: i32, filename: &str, text: &str) -> Vec<String> {
    vec![size.to_string(), filename.to_string(), preview(text, ARGS_PREVIEW_CHARS)]
}

/// First `max_chars` characters of `text`.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// `outer: inner: root` message for an error and its sources.
fn error_chain(err: &BridgeError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
