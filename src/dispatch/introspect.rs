//! Runtime signature dump of an automation object.
//!
//! With debug output on, the bridge logs what the component's type library
//! says about each method. This is how the frames declared in
//! [`crate::methods`] are checked against the installed component.

use super::{RawDispatch, vartype_name};
use crate::methods;
use crate::Result;
use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;
use tracing::{debug, warn};

/// One parameter as described by the type library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamInfo {
    pub name: String,
    pub vt: u16,
    /// `PARAMFLAG_*` bits
    pub flags: u16,
}

/// One function as described by the type library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    pub memid: i32,
    pub return_vt: u16,
    pub params: Vec<ParamInfo>,
}

impl FunctionInfo {
    /// Functions whose parameters are listed one by one.
    fn is_watched(&self) -> bool {
        [methods::JV_READ.name, methods::JV_SET_UI_PROPERTIES.name]
            .iter()
            .any(|watched| watched.eq_ignore_ascii_case(&self.name))
    }

    /// `(declared, runtime)` parameter counts when a method the bridge calls
    /// disagrees with the type library.
    pub fn arity_mismatch(&self) -> Option<(usize, usize)> {
        let declared = methods::ALL.iter().find(|m| m.name.eq_ignore_ascii_case(&self.name))?;
        (declared.arity() != self.params.len()).then_some((declared.arity(), self.params.len()))
    }
}

impl fmt::Display for FunctionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name={} memid={} cParams={} returnvt={}",
            self.name,
            self.memid,
            self.params.len(),
            vartype_name(self.return_vt)
        )
    }
}

impl fmt::Display for ParamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name={} vt={} wParamFlags=0x{:X}", self.name, vartype_name(self.vt), self.flags)
    }
}

/// Log the object's type description and return what was read.
///
/// `walk` takes ownership of the `ITypeInfo` reference and reads the function
/// descriptions out of it. Any failure is logged and yields an empty list.
pub fn dump_signatures<F>(dispatch: &RawDispatch<'_>, walk: F) -> Vec<FunctionInfo>
where
    F: FnOnce(NonNull<c_void>) -> Result<Vec<FunctionInfo>>,
{
    let functions = match dispatch.type_info() {
        Ok(None) => {
            debug!("IDispatch exposes no type information");
            return Vec::new();
        }
        Ok(Some(info)) => walk(info),
        Err(err) => Err(err),
    };

    match functions {
        Ok(functions) => {
            log_functions(&functions);
            functions
        }
        Err(err) => {
            debug!(error = %err, "Signature dump failed");
            Vec::new()
        }
    }
}

fn log_functions(functions: &[FunctionInfo]) {
    for (index, function) in functions.iter().enumerate() {
        debug!(index, %function, "IDispatch function");

        if function.is_watched() {
            for (position, param) in function.params.iter().enumerate() {
                debug!(method = %function.name, position, %param, "Runtime parameter");
            }
        }

        if let Some((declared, runtime)) = function.arity_mismatch() {
            warn!(
                method = %function.name,
                declared,
                runtime,
                "Declared parameter count differs from the type library"
            );
        }
    }
}
