//! Declared signatures of the JV-Link methods the bridge calls.
//!
//! Parameter names follow the JV-Link type library. They are only used to bind
//! arguments; the component resolves methods by name alone.

use crate::dispatch::MethodSignature;

pub const JV_INIT: MethodSignature = MethodSignature::new("JVInit", &["sid"]);
pub const JV_SET_SAVE_PATH: MethodSignature = MethodSignature::new("JVSetSavePath", &["savepath"]);
pub const JV_SET_SAVE_FLAG: MethodSignature = MethodSignature::new("JVSetSaveFlag", &["saveflag"]);
pub const JV_SET_PAY_FLAG: MethodSignature = MethodSignature::new("JVSetPayFlag", &["payflag"]);
pub const JV_SET_UI_PROPERTIES: MethodSignature = MethodSignature::new("JVSetUIProperties", &[]);
pub const JV_OPEN: MethodSignature = MethodSignature::new(
    "JVOpen",
    &["dataspec", "fromtime", "option", "readcount", "downloadcount", "lastfiletimestamp"],
);
pub const JV_STATUS: MethodSignature = MethodSignature::new("JVStatus", &[]);
pub const JV_READ: MethodSignature = MethodSignature::new("JVRead", &["buff", "size", "filename"]);
pub const JV_CLOSE: MethodSignature = MethodSignature::new("JVClose", &[]);

/// Every method the bridge may call, in call order.
pub const ALL: [&MethodSignature; 9] = [
    &JV_INIT,
    &JV_SET_SAVE_PATH,
    &JV_SET_SAVE_FLAG,
    &JV_SET_PAY_FLAG,
    &JV_SET_UI_PROPERTIES,
    &JV_OPEN,
    &JV_STATUS,
    &JV_READ,
    &JV_CLOSE,
];
