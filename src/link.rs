//! Capability trait for the JV-Link component

use crate::Result;
pub use crate::reader::ReadOutcome;

/// Placeholder code recorded when a call produced no usable return value.
pub const UNKNOWN_RET: i32 = -9999;
/// `JVRead` code meaning "download still in progress, try again shortly".
pub const READ_NOT_READY: i32 = -3;

/// Arguments of `JVOpen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenRequest<'a> {
    pub dataspec: &'a str,
    pub fromdate: &'a str,
    pub option: i32,
}

/// Return code and output parameters of `JVOpen`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OpenOutcome {
    pub ret: i32,
    pub readcount: i32,
    pub downloadcount: i32,
    pub lastfiletimestamp: String,
}

/// One method per remote operation of the JV-Link component.
///
/// Implementations resolve method names and build call frames internally;
/// callers never dispatch by string. Every method returns the component's raw
/// return code. `Err` means the call itself failed (name resolution, a failed
/// `Invoke`, a transport problem), not that the component reported an error
/// code.
pub trait JvLink {
    /// `JVInit(sid)`
    fn init(&mut self, sid: i32) -> Result<i32>;

    /// `JVSetSavePath(path)`
    fn set_save_path(&mut self, path: &str) -> Result<i32>;

    /// `JVSetSaveFlag(flag)`
    fn set_save_flag(&mut self, flag: bool) -> Result<i32>;

    /// `JVSetPayFlag(flag)`
    fn set_pay_flag(&mut self, flag: bool) -> Result<i32>;

    /// `JVSetUIProperties()`; shows JV-Link's settings dialog.
    fn set_ui_properties(&mut self) -> Result<i32>;

    /// `JVOpen(dataspec, fromtime, option, &readcount, &downloadcount, &lastfiletimestamp)`
    ///
    /// Starts the component's background download; a negative `ret` is an error.
    fn open(&mut self, request: &OpenRequest<'_>) -> Result<OpenOutcome>;

    /// `JVStatus()`: 0 when ready, negative on error, otherwise still preparing.
    fn status(&mut self) -> Result<i32>;

    /// `JVRead(&buff, &size, &filename)` for one logical record.
    fn read(&mut self) -> Result<ReadOutcome>;

    /// `JVClose()`
    fn close(&mut self) -> Result<i32>;

    /// VARIANT type names of the `JVRead` arguments, reported with each attempt.
    fn read_argument_types(&self) -> Vec<String> {
        crate::reader::BufferedReader::argument_types().into_iter().map(str::to_string).collect()
    }
}
