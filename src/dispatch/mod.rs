//! Raw `IDispatch` invocation.
//!
//! This module calls methods on a COM automation object without going through
//! any automatic marshaling layer. It reads the object's vtable directly,
//! resolves method names with `GetIDsOfNames` and performs `Invoke` over a
//! hand-built argument vector.
//!
//! # Why raw frames
//!
//! JV-Link's `JVRead` corrupts memory when its string parameters are marshaled
//! as `BSTR`s by a dynamic scripting host. Passing the same parameters as
//! `VT_BYREF | VT_UI1` pointers into caller-owned byte buffers avoids that path.
//! The layout types in [`vtable`] are platform neutral, which lets tests drive
//! the invoker through fake objects that carry a real vtable.
//!
//! # Usage
//!
//! ```rust,ignore
//! let dispatch = unsafe { RawDispatch::from_raw(interface_ptr) };
//! let id = dispatch.resolve("JVStatus")?;
//! let status = unsafe { dispatch.invoke(id, &CallFrame::new(&JV_STATUS))? };
//! ```

mod frame;
mod introspect;
mod invoker;
pub mod vtable;

pub use frame::{ArgSlot, CallFrame, MethodSignature, vartype_name};
pub use introspect::{FunctionInfo, ParamInfo, dump_signatures};
pub use invoker::{DispatchId, RawDispatch};
