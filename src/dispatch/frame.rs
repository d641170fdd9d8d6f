//! Call frame builder for raw `IDispatch::Invoke` calls.
//!
//! `IDispatch::Invoke` expects its positional arguments in *reverse* declared
//! order: the last declared parameter sits in `rgvarg[0]`. Getting this wrong
//! does not fail loudly, it silently hands each buffer to the wrong parameter.
//! [`CallFrame`] is the only place that knows the rule. Call sites bind
//! arguments by parameter name and never see a slot index.
//!
//! ```rust
//! use jvbridge::dispatch::{ArgSlot, CallFrame, MethodSignature};
//!
//! const READ: MethodSignature = MethodSignature::new("JVRead", &["buff", "size", "filename"]);
//!
//! let mut buff = [0u8; 8];
//! let mut size = 0i32;
//! let mut filename = [0u8; 8];
//!
//! let mut frame = CallFrame::new(&READ);
//! frame
//!     .bind("buff", ArgSlot::BytesRef(buff.as_mut_ptr()))?
//!     .bind("size", ArgSlot::I32Ref(&mut size))?
//!     .bind("filename", ArgSlot::BytesRef(filename.as_mut_ptr()))?;
//!
//! assert_eq!(frame.slot_of("filename"), Some(0));
//! assert_eq!(frame.slot_of("buff"), Some(2));
//! # Ok::<(), jvbridge::BridgeError>(())
//! ```

use super::vtable::{
    RawDispParams, RawVariant, VT_BOOL, VT_BSTR, VT_BYREF, VT_EMPTY, VT_HRESULT, VT_I2, VT_I4,
    VT_UI1, VT_VARIANT, VT_VOID,
};
use crate::{BridgeError, Result};

/// Declared name and parameter list of a remote method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: &'static str,
    pub params: &'static [&'static str],
}

impl MethodSignature {
    pub const fn new(name: &'static str, params: &'static [&'static str]) -> Self {
        Self { name, params }
    }

    /// Number of declared parameters.
    pub const fn arity(&self) -> usize {
        self.params.len()
    }
}

/// A typed argument value. Pointer arms are not dereferenced by this crate;
/// they are handed to the callee, which reads or writes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSlot {
    /// `VT_I4` by value.
    I32(i32),
    /// Flag passed as `VT_I4` 1/0; JV-Link declares its flags as `Long`.
    Bool(bool),
    /// `VT_BYREF | VT_I4`
    I32Ref(*mut i32),
    /// `VT_BYREF | VT_UI1`: a raw byte buffer the callee fills.
    BytesRef(*mut u8),
    /// `VT_BSTR` by value; the caller keeps ownership of the string.
    Bstr(*const u16),
    /// `VT_BYREF | VT_BSTR`; the callee may replace the string.
    BstrRef(*mut *mut u16),
}

impl ArgSlot {
    /// The `VARTYPE` this argument is passed as.
    pub fn vartype(&self) -> u16 {
        match self {
            ArgSlot::I32(_) | ArgSlot::Bool(_) => VT_I4,
            ArgSlot::I32Ref(_) => VT_BYREF | VT_I4,
            ArgSlot::BytesRef(_) => VT_BYREF | VT_UI1,
            ArgSlot::Bstr(_) => VT_BSTR,
            ArgSlot::BstrRef(_) => VT_BYREF | VT_BSTR,
        }
    }

    /// Human-readable type name used in read diagnostics.
    pub fn type_name(&self) -> &'static str {
        vartype_name(self.vartype())
    }

    fn to_variant(self) -> RawVariant {
        let word = match self {
            ArgSlot::I32(value) => value as u32 as usize,
            ArgSlot::Bool(flag) => usize::from(flag),
            ArgSlot::I32Ref(ptr) => ptr as usize,
            ArgSlot::BytesRef(ptr) => ptr as usize,
            ArgSlot::Bstr(ptr) => ptr as usize,
            ArgSlot::BstrRef(ptr) => ptr as usize,
        };
        RawVariant::new(self.vartype(), word)
    }
}

impl std::fmt::Display for ArgSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self.type_name();
        match *self {
            ArgSlot::I32(value) => write!(f, "{name} = {value}"),
            ArgSlot::Bool(flag) => write!(f, "{name} = {}", i32::from(flag)),
            ArgSlot::I32Ref(ptr) => write!(f, "{name} @ {ptr:p}"),
            ArgSlot::BytesRef(ptr) => write!(f, "{name} @ {ptr:p}"),
            ArgSlot::Bstr(ptr) => write!(f, "{name} @ {ptr:p}"),
            ArgSlot::BstrRef(ptr) => write!(f, "{name} @ {ptr:p}"),
        }
    }
}

/// Name of a `VARTYPE` as printed by COM tooling.
pub fn vartype_name(vt: u16) -> &'static str {
    match vt {
        VT_EMPTY => "VT_EMPTY",
        VT_I2 => "VT_I2",
        VT_I4 => "VT_I4",
        VT_BSTR => "VT_BSTR",
        VT_BOOL => "VT_BOOL",
        VT_VARIANT => "VT_VARIANT",
        VT_UI1 => "VT_UI1",
        VT_VOID => "VT_VOID",
        VT_HRESULT => "VT_HRESULT",
        v if v == VT_BYREF | VT_I4 => "VT_BYREF|VT_I4",
        v if v == VT_BYREF | VT_UI1 => "VT_BYREF|VT_UI1",
        v if v == VT_BYREF | VT_BSTR => "VT_BYREF|VT_BSTR",
        v if v == VT_BYREF | VT_VARIANT => "VT_BYREF|VT_VARIANT",
        _ => "VT_UNKNOWN",
    }
}

/// Arguments for one invocation, bound by parameter name.
#[derive(Debug, Clone)]
pub struct CallFrame<'s> {
    signature: &'s MethodSignature,
    bound: Vec<Option<ArgSlot>>,
}

impl<'s> CallFrame<'s> {
    pub fn new(signature: &'s MethodSignature) -> Self {
        Self { signature, bound: vec![None; signature.arity()] }
    }

    pub fn method(&self) -> &'static str {
        self.signature.name
    }

    pub fn arity(&self) -> usize {
        self.signature.arity()
    }

    /// Bind `param` to `slot`. Each parameter may be bound once.
    pub fn bind(&mut self, param: &str, slot: ArgSlot) -> Result<&mut Self> {
        let position = self.position_of(param).ok_or_else(|| {
            BridgeError::frame_binding(self.signature.name, format!("unknown parameter '{param}'"))
        })?;

        if self.bound[position].is_some() {
            return Err(BridgeError::frame_binding(
                self.signature.name,
                format!("parameter '{param}' bound twice"),
            ));
        }

        self.bound[position] = Some(slot);
        Ok(self)
    }

    /// Index of `param` in the `rgvarg` array the callee will receive.
    pub fn slot_of(&self, param: &str) -> Option<usize> {
        self.position_of(param).map(|position| self.arity() - 1 - position)
    }

    /// Type names of the bound arguments in declared order.
    pub fn declared_types(&self) -> Vec<&'static str> {
        self.bound
            .iter()
            .map(|slot| slot.map(|s| s.type_name()).unwrap_or(vartype_name(VT_EMPTY)))
            .collect()
    }

    /// `name: type = value` for each bound argument, in declared order.
    pub fn preview(&self) -> String {
        self.signature
            .params
            .iter()
            .zip(&self.bound)
            .filter_map(|(name, slot)| slot.map(|s| format!("{name}: {s}")))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Lay the arguments out in invocation order. Fails if any parameter is unbound.
    pub(crate) fn pack(&self) -> Result<PackedFrame> {
        if let Some(position) = self.bound.iter().position(Option::is_none) {
            return Err(BridgeError::frame_binding(
                self.signature.name,
                format!("parameter '{}' is not bound", self.signature.params[position]),
            ));
        }

        let args: Vec<RawVariant> =
            self.bound.iter().rev().flatten().map(|slot| slot.to_variant()).collect();

        Ok(PackedFrame { args: args.into_boxed_slice() })
    }

    fn position_of(&self, param: &str) -> Option<usize> {
        self.signature.params.iter().position(|p| *p == param)
    }
}

/// Argument vector in `rgvarg` order. Owns the storage the `DISPPARAMS`
/// record points into, so the record must not outlive it.
#[derive(Debug)]
pub(crate) struct PackedFrame {
    args: Box<[RawVariant]>,
}

impl PackedFrame {
    pub(crate) fn dispparams(&mut self) -> RawDispParams {
        let rgvarg =
            if self.args.is_empty() { std::ptr::null_mut() } else { self.args.as_mut_ptr() };

        RawDispParams {
            rgvarg,
            rgdispid_named_args: std::ptr::null_mut(),
            c_args: self.args.len() as u32,
            c_named_args: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn args(&self) -> &[RawVariant] {
        &self.args
    }
}
