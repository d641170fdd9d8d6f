//! Raw `IDispatch` invocation by walking the object's vtable.

use super::frame::CallFrame;
use super::vtable::{
    DISPATCH_METHOD, Guid, IDispatchVtbl, LOCALE_EN_US, RawVariant, VT_I4,
};
use crate::{BridgeError, Result};
use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr::NonNull;
use tracing::trace;

/// Numeric id of a named method, as returned by `GetIDsOfNames`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchId(pub i32);

/// Non-owning view of a live `IDispatch` object.
///
/// The lifetime ties the view to whatever owns the interface pointer, so the
/// object cannot be released while a `RawDispatch` is still in use.
#[derive(Debug, Clone, Copy)]
pub struct RawDispatch<'a> {
    this: NonNull<c_void>,
    _owner: PhantomData<&'a ()>,
}

impl<'a> RawDispatch<'a> {
    /// Wrap a raw interface pointer.
    ///
    /// # Safety
    ///
    /// `this` must point to a live COM object whose first field is a pointer to
    /// an [`IDispatchVtbl`]-compatible vtable, and the object must stay alive
    /// for `'a`.
    pub unsafe fn from_raw(this: NonNull<c_void>) -> Self {
        Self { this, _owner: PhantomData }
    }

    fn vtable(&self) -> &IDispatchVtbl {
        // SAFETY: per `from_raw`, the object starts with a valid vtable pointer
        unsafe { &**(self.this.as_ptr() as *const *const IDispatchVtbl) }
    }

    /// Number of type descriptions the object exposes (0 or 1), from
    /// `GetTypeInfoCount` (slot 3).
    pub fn type_info_count(&self) -> Result<u32> {
        let mut count: u32 = 0;
        let hr = unsafe { (self.vtable().get_type_info_count)(self.this.as_ptr(), &mut count) };
        if hr < 0 {
            return Err(BridgeError::remote_invocation("GetTypeInfoCount", hr));
        }
        Ok(count)
    }

    /// The object's `ITypeInfo` from `GetTypeInfo` (slot 4), or `None` when it
    /// exposes none. The caller owns the returned reference and must release it.
    pub fn type_info(&self) -> Result<Option<NonNull<c_void>>> {
        let count = self.type_info_count()?;
        trace!(count, "GetTypeInfoCount");
        if count == 0 {
            return Ok(None);
        }

        let mut info: *mut c_void = std::ptr::null_mut();
        let hr =
            unsafe { (self.vtable().get_type_info)(self.this.as_ptr(), 0, LOCALE_EN_US, &mut info) };
        if hr < 0 {
            return Err(BridgeError::remote_invocation("GetTypeInfo", hr));
        }
        NonNull::new(info)
            .map(Some)
            .ok_or_else(|| BridgeError::transport_fault("GetTypeInfo", "null ITypeInfo pointer".into()))
    }

    /// Resolve `name` to its dispatch id through `GetIDsOfNames` (slot 5).
    pub fn resolve(&self, name: &str) -> Result<DispatchId> {
        let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
        let names = [wide.as_ptr()];
        let mut id: i32 = 0;

        let hr = unsafe {
            (self.vtable().get_ids_of_names)(
                self.this.as_ptr(),
                &Guid::NULL,
                names.as_ptr(),
                1,
                LOCALE_EN_US,
                &mut id,
            )
        };

        if hr < 0 {
            return Err(BridgeError::RemoteNameNotFound { name: name.to_string(), hresult: hr });
        }

        trace!(name, dispid = id, "Resolved dispatch id");
        Ok(DispatchId(id))
    }

    /// Invoke `id` as a method through `Invoke` (slot 6) with the arguments in
    /// `frame`, returning the method's `VT_I4` result (0 for any other type).
    ///
    /// # Safety
    ///
    /// Every pointer bound into `frame` must be valid for the reads and writes
    /// the callee performs through it for the duration of the call.
    pub unsafe fn invoke(&self, id: DispatchId, frame: &CallFrame<'_>) -> Result<i32> {
        let mut packed = frame.pack()?;
        let mut params = packed.dispparams();
        let mut result = RawVariant::default();

        trace!(method = frame.method(), dispid = id.0, args = params.c_args, "Invoking");

        let hr = unsafe {
            (self.vtable().invoke)(
                self.this.as_ptr(),
                id.0,
                &Guid::NULL,
                LOCALE_EN_US,
                DISPATCH_METHOD,
                &mut params,
                &mut result,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };

        if hr < 0 {
            return Err(BridgeError::remote_invocation(frame.method(), hr));
        }

        Ok(if result.vt == VT_I4 { result.as_i32() } else { 0 })
    }
}
