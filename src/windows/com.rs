//! COM apartment and JV-Link activation.

use crate::dispatch::RawDispatch;
use crate::{BridgeError, Result};
use std::marker::PhantomData;
use std::ptr::NonNull;
use tracing::{debug, trace};
use windows::Win32::System::Com::{
    CLSCTX_ALL, CLSIDFromProgID, COINIT_APARTMENTTHREADED, CoCreateInstance, CoInitializeEx,
    CoUninitialize, IDispatch,
};
use windows::core::PCWSTR;
use windows_core::Interface;

/// Single-threaded COM apartment for the current thread.
///
/// Uninitialized on drop, so it must outlive every object created in it.
pub struct Apartment {
    // COM apartments are per thread
    _not_send: PhantomData<*const ()>,
}

impl Apartment {
    pub fn enter() -> Result<Self> {
        unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) }
            .ok()
            .map_err(|e| BridgeError::windows_api_error("CoInitializeEx", e))?;
        trace!("Entered single-threaded COM apartment");
        Ok(Self { _not_send: PhantomData })
    }
}

impl Drop for Apartment {
    fn drop(&mut self) {
        unsafe { CoUninitialize() };
        trace!("Left COM apartment");
    }
}

/// Owned `IDispatch` of an activated component.
///
/// Released exactly once when dropped, on every exit path.
pub struct ComObject {
    prog_id: String,
    dispatch: IDispatch,
}

impl ComObject {
    /// Create the component registered under `prog_id`.
    ///
    /// The borrow of `apartment` keeps the object from outliving COM.
    pub fn activate(_apartment: &Apartment, prog_id: &str) -> Result<Self> {
        debug!(prog_id, "Resolving CLSID");
        let wide = wide_string(prog_id);
        let clsid = unsafe { CLSIDFromProgID(PCWSTR::from_raw(wide.as_ptr())) }
            .map_err(|e| activation_error(prog_id, e))?;

        debug!(prog_id, ?clsid, "Creating instance");
        let dispatch: IDispatch = unsafe { CoCreateInstance(&clsid, None, CLSCTX_ALL) }
            .map_err(|e| activation_error(prog_id, e))?;

        debug!(prog_id, "COM instance created");
        Ok(Self { prog_id: prog_id.to_string(), dispatch })
    }

    /// Raw view for vtable calls, valid while `self` is alive.
    pub fn dispatch(&self) -> Result<RawDispatch<'_>> {
        let raw = NonNull::new(self.dispatch.as_raw()).ok_or_else(|| {
            BridgeError::transport_fault("IDispatch", "null interface pointer".into())
        })?;
        // SAFETY: `raw` is the live IDispatch owned by `self`
        Ok(unsafe { RawDispatch::from_raw(raw) })
    }
}

impl Drop for ComObject {
    fn drop(&mut self) {
        debug!(prog_id = %self.prog_id, "Releasing COM object");
    }
}

fn activation_error(prog_id: &str, source: windows_core::Error) -> BridgeError {
    BridgeError::Activation { prog_id: prog_id.to_string(), source: Some(Box::new(source)) }
}

/// Null-terminated UTF-16 copy of `s`.
fn wide_string(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}
