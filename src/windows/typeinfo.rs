//! `ITypeInfo` walk behind the debug signature dump.

use crate::dispatch::{FunctionInfo, ParamInfo};
use crate::{BridgeError, Result};
use std::ffi::c_void;
use std::ptr::NonNull;
use windows::Win32::System::Com::ITypeInfo;
use windows_core::{BSTR, Interface};

/// Read every function description out of `info`.
///
/// Takes ownership of the reference; it is released when this returns.
pub fn functions(info: NonNull<c_void>) -> Result<Vec<FunctionInfo>> {
    // SAFETY: `info` is an owned ITypeInfo reference handed out by GetTypeInfo
    let info = unsafe { ITypeInfo::from_raw(info.as_ptr()) };

    let attr = unsafe { info.GetTypeAttr() }
        .map_err(|e| BridgeError::windows_api_error("ITypeInfo::GetTypeAttr", e))?;
    // SAFETY: `attr` stays valid until ReleaseTypeAttr
    let count = unsafe { (*attr).cFuncs };

    let functions = (0..u32::from(count)).map(|index| function(&info, index)).collect();
    unsafe { info.ReleaseTypeAttr(attr) };
    functions
}

fn function(info: &ITypeInfo, index: u32) -> Result<FunctionInfo> {
    let desc = unsafe { info.GetFuncDesc(index) }
        .map_err(|e| BridgeError::windows_api_error("ITypeInfo::GetFuncDesc", e))?;
    // SAFETY: `desc` stays valid until ReleaseFuncDesc
    let fd = unsafe { &*desc };
    let memid = fd.memid;
    let param_count = usize::try_from(fd.cParams).unwrap_or(0);

    // Slot 0 receives the function name, the rest the parameter names
    let mut names = vec![BSTR::new(); param_count + 1];
    let mut filled = 0u32;
    let got = match unsafe { info.GetNames(memid, &mut names, &mut filled) } {
        Ok(()) => filled as usize,
        Err(_) => 0,
    };

    let params = (0..param_count)
        .map(|p| {
            // SAFETY: the type library allocates `cParams` ELEMDESCs
            let elem = unsafe { &*fd.lprgelemdescParam.add(p) };
            ParamInfo {
                name: if p + 1 < got { names[p + 1].to_string() } else { format!("param{p}") },
                vt: elem.tdesc.vt.0,
                flags: unsafe { elem.Anonymous.paramdesc.wParamFlags.0 },
            }
        })
        .collect();
    let return_vt = fd.elemdescFunc.tdesc.vt.0;

    unsafe { info.ReleaseFuncDesc(desc) };

    Ok(FunctionInfo {
        name: if got > 0 { names[0].to_string() } else { format!("memid:{memid}") },
        memid,
        return_vt,
        params,
    })
}
