//! Binary layout of `IDispatch` and its call structures.
//!
//! These mirror the OLE Automation ABI exactly: `VARIANT` is 16 bytes on
//! 32-bit targets and 24 bytes on 64-bit targets, `DISPPARAMS` is two pointers
//! followed by two counts. Nothing here depends on Windows headers, so the same
//! layout can be exercised by fake dispatch objects on any platform.

use std::ffi::c_void;

/// Raw COM status code. Negative values are failures.
pub type HResult = i32;

/// `VT_EMPTY`
pub const VT_EMPTY: u16 = 0;
/// `VT_I2` (16-bit signed integer)
pub const VT_I2: u16 = 2;
/// `VT_I4` (32-bit signed integer)
pub const VT_I4: u16 = 3;
/// `VT_BSTR` (length-prefixed UTF-16 string)
pub const VT_BSTR: u16 = 8;
/// `VT_BOOL`
pub const VT_BOOL: u16 = 11;
/// `VT_VARIANT`
pub const VT_VARIANT: u16 = 12;
/// `VT_UI1` (unsigned byte)
pub const VT_UI1: u16 = 17;
/// `VT_VOID`, seen as a return type in type libraries
pub const VT_VOID: u16 = 24;
/// `VT_HRESULT`
pub const VT_HRESULT: u16 = 25;
/// `VT_BYREF` modifier flag
pub const VT_BYREF: u16 = 0x4000;

/// `DISPATCH_METHOD` flag for `IDispatch::Invoke`
pub const DISPATCH_METHOD: u16 = 1;
/// en-US locale used for name resolution and invocation
pub const LOCALE_EN_US: u32 = 0x0409;

/// `DISP_E_UNKNOWNNAME`
pub const DISP_E_UNKNOWNNAME: HResult = 0x8002_0006_u32 as HResult;
/// `DISP_E_TYPEMISMATCH`
pub const DISP_E_TYPEMISMATCH: HResult = 0x8002_0005_u32 as HResult;
/// `DISP_E_EXCEPTION`
pub const DISP_E_EXCEPTION: HResult = 0x8002_0009_u32 as HResult;
/// `DISP_E_BADPARAMCOUNT`
pub const DISP_E_BADPARAMCOUNT: HResult = 0x8002_000E_u32 as HResult;

/// COM GUID with the Windows in-memory layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    /// `IID_NULL`, required as the `riid` argument of `GetIDsOfNames` and `Invoke`.
    pub const NULL: Guid = Guid { data1: 0, data2: 0, data3: 0, data4: [0; 8] };
}

/// `VARIANT` as laid out by OLE Automation.
///
/// The data union is two pointers wide (the `BRECORD` arm), which gives the
/// 16/24 byte sizes on x86/x64. Only the first word is used by this crate.
#[repr(C, align(8))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawVariant {
    pub vt: u16,
    pub reserved: [u16; 3],
    pub data: [usize; 2],
}

impl RawVariant {
    /// Variant of type `vt` whose first data word holds `word`.
    pub fn new(vt: u16, word: usize) -> Self {
        Self { vt, reserved: [0; 3], data: [word, 0] }
    }

    /// The `lVal` arm, valid when `vt == VT_I4`.
    pub fn as_i32(&self) -> i32 {
        self.data[0] as u32 as i32
    }

    /// The pointer arm, valid for `VT_BYREF` and `VT_BSTR` variants.
    pub fn as_ptr(&self) -> *mut c_void {
        self.data[0] as *mut c_void
    }
}

/// `DISPPARAMS`
#[repr(C)]
#[derive(Debug)]
pub struct RawDispParams {
    pub rgvarg: *mut RawVariant,           // Arguments, last declared first
    pub rgdispid_named_args: *mut i32,     // Always null here
    pub c_args: u32,                       // Number of entries in rgvarg
    pub c_named_args: u32,                 // Always 0 here
}

pub type QueryInterfaceFn =
    unsafe extern "system" fn(this: *mut c_void, riid: *const Guid, out: *mut *mut c_void) -> HResult;
pub type AddRefFn = unsafe extern "system" fn(this: *mut c_void) -> u32;
pub type ReleaseFn = unsafe extern "system" fn(this: *mut c_void) -> u32;
pub type GetTypeInfoCountFn = unsafe extern "system" fn(this: *mut c_void, count: *mut u32) -> HResult;
pub type GetTypeInfoFn = unsafe extern "system" fn(
    this: *mut c_void,
    index: u32,
    lcid: u32,
    out: *mut *mut c_void,
) -> HResult;
pub type GetIdsOfNamesFn = unsafe extern "system" fn(
    this: *mut c_void,
    riid: *const Guid,
    names: *const *const u16,
    count: u32,
    lcid: u32,
    ids: *mut i32,
) -> HResult;
pub type InvokeFn = unsafe extern "system" fn(
    this: *mut c_void,
    dispid: i32,
    riid: *const Guid,
    lcid: u32,
    flags: u16,
    params: *mut RawDispParams,
    result: *mut RawVariant,
    excep_info: *mut c_void,
    arg_err: *mut u32,
) -> HResult;

/// `IDispatch` vtable: the three `IUnknown` slots followed by the four
/// `IDispatch` slots. `GetIDsOfNames` is slot 5 and `Invoke` is slot 6.
#[repr(C)]
pub struct IDispatchVtbl {
    pub query_interface: QueryInterfaceFn,
    pub add_ref: AddRefFn,
    pub release: ReleaseFn,
    pub get_type_info_count: GetTypeInfoCountFn,
    pub get_type_info: GetTypeInfoFn,
    pub get_ids_of_names: GetIdsOfNamesFn,
    pub invoke: InvokeFn,
}

/// Slot index of `GetIDsOfNames` in the vtable.
pub const SLOT_GET_IDS_OF_NAMES: usize = 5;
/// Slot index of `Invoke` in the vtable.
pub const SLOT_INVOKE: usize = 6;
