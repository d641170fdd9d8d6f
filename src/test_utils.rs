//! Test doubles for the dispatch layer and the orchestrator.
//!
//! [`FakeDispatch`] is a real COM-shaped object: its first field points at a
//! `#[repr(C)]` vtable of `extern "system"` functions, so the invoker walks it
//! exactly as it walks JV-Link. Every `Invoke` it receives is recorded and
//! answered from a queue of scripted replies.

#![cfg(test)]

use crate::clock::Clock;
use crate::dispatch::vtable::{
    DISP_E_BADPARAMCOUNT, DISP_E_EXCEPTION, DISP_E_TYPEMISMATCH, DISP_E_UNKNOWNNAME, Guid, HResult,
    IDispatchVtbl, RawDispParams, RawVariant, VT_BYREF, VT_I4, VT_UI1,
};
use crate::dispatch::RawDispatch;
use crate::link::{JvLink, OpenOutcome, OpenRequest, ReadOutcome};
use crate::reader::FILENAME_CAPACITY;
use crate::{BridgeError, Result};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::ffi::c_void;
use std::ptr::NonNull;
use std::rc::Rc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;

const S_OK: HResult = 0;
const E_NOTIMPL: HResult = 0x8000_4001_u32 as HResult;
const E_NOINTERFACE: HResult = 0x8000_4002_u32 as HResult;
const DISPID_UNKNOWN: i32 = -1;

/// Scripted answer to one `Invoke`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeReply {
    /// Return `VT_I4` with this value.
    Value(i32),
    /// Return `VT_EMPTY`.
    Empty,
    /// Fail the call with this HRESULT.
    Fail(HResult),
    /// Answer a `JVRead` frame: write `payload`, `size` and `filename` through
    /// the caller's pointers and return `ret`.
    Read { ret: i32, size: i32, payload: Vec<u8>, filename: Vec<u8> },
}

impl FakeReply {
    pub fn value(ret: i32) -> Self {
        Self::Value(ret)
    }

    pub fn read(ret: i32, size: i32, payload: &[u8], filename: &[u8]) -> Self {
        Self::Read { ret, size, payload: payload.to_vec(), filename: filename.to_vec() }
    }
}

/// One `Invoke` as seen by the fake object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub dispid: i32,
    pub flags: u16,
    pub lcid: u32,
    pub named_args: u32,
    /// `(vt, first data word)` of each argument, in `rgvarg` order.
    pub args: Vec<(u16, usize)>,
}

#[derive(Debug, Default)]
struct FakeState {
    names: Vec<String>,
    replies: VecDeque<FakeReply>,
    calls: Vec<RecordedCall>,
    type_info_count: u32,
    serves_type_info: bool,
}

#[repr(C)]
struct FakeObject {
    vtbl: *const IDispatchVtbl,
    state: RefCell<FakeState>,
}

static FAKE_VTBL: IDispatchVtbl = IDispatchVtbl {
    query_interface: fake_query_interface,
    add_ref: fake_add_ref,
    release: fake_release,
    get_type_info_count: fake_get_type_info_count,
    get_type_info: fake_get_type_info,
    get_ids_of_names: fake_get_ids_of_names,
    invoke: fake_invoke,
};

/// In-process `IDispatch` object with a fixed method table.
///
/// Method ids are the 1-based positions of the names passed to
/// [`FakeDispatch::new`]; lookups are case-sensitive.
pub struct FakeDispatch {
    object: Box<FakeObject>,
}

impl FakeDispatch {
    pub fn new(names: &[&str]) -> Self {
        let state = FakeState {
            names: names.iter().map(|n| n.to_string()).collect(),
            ..FakeState::default()
        };
        Self { object: Box::new(FakeObject { vtbl: &FAKE_VTBL, state: RefCell::new(state) }) }
    }

    pub fn dispatch(&self) -> RawDispatch<'_> {
        let this = NonNull::from(&*self.object).cast::<c_void>();
        // SAFETY: the boxed object starts with its vtable pointer and lives as long as `self`
        unsafe { RawDispatch::from_raw(this) }
    }

    /// Report `count` from `GetTypeInfoCount`; `GetTypeInfo` still fails.
    pub fn with_type_info_count(self, count: u32) -> Self {
        self.object.state.borrow_mut().type_info_count = count;
        self
    }

    /// Answer `GetTypeInfo` with the object's own address as an opaque
    /// `ITypeInfo` that must never be called through.
    pub fn with_type_info(self) -> Self {
        {
            let mut state = self.object.state.borrow_mut();
            state.type_info_count = 1;
            state.serves_type_info = true;
        }
        self
    }

    pub fn push_reply(&self, reply: FakeReply) {
        self.object.state.borrow_mut().replies.push_back(reply);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.object.state.borrow().calls.clone()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.object.state.borrow().calls.last().cloned()
    }

    pub fn call_count(&self) -> usize {
        self.object.state.borrow().calls.len()
    }
}

unsafe fn object<'a>(this: *mut c_void) -> &'a FakeObject {
    unsafe { &*(this as *const FakeObject) }
}

unsafe fn wide_to_string(ptr: *const u16) -> String {
    let mut len = 0;
    unsafe {
        while *ptr.add(len) != 0 {
            len += 1;
        }
        String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len))
    }
}

unsafe extern "system" fn fake_query_interface(
    _this: *mut c_void,
    _riid: *const Guid,
    out: *mut *mut c_void,
) -> HResult {
    if !out.is_null() {
        unsafe { *out = std::ptr::null_mut() };
    }
    E_NOINTERFACE
}

unsafe extern "system" fn fake_add_ref(_this: *mut c_void) -> u32 {
    1
}

unsafe extern "system" fn fake_release(_this: *mut c_void) -> u32 {
    1
}

unsafe extern "system" fn fake_get_type_info_count(this: *mut c_void, count: *mut u32) -> HResult {
    unsafe { *count = object(this).state.borrow().type_info_count };
    S_OK
}

unsafe extern "system" fn fake_get_type_info(
    this: *mut c_void,
    _index: u32,
    _lcid: u32,
    out: *mut *mut c_void,
) -> HResult {
    if unsafe { object(this) }.state.borrow().serves_type_info {
        unsafe { *out = this };
        return S_OK;
    }
    unsafe { *out = std::ptr::null_mut() };
    E_NOTIMPL
}

unsafe extern "system" fn fake_get_ids_of_names(
    this: *mut c_void,
    _riid: *const Guid,
    names: *const *const u16,
    count: u32,
    _lcid: u32,
    ids: *mut i32,
) -> HResult {
    let state = unsafe { object(this) }.state.borrow();
    for i in 0..count as usize {
        let name = unsafe { wide_to_string(*names.add(i)) };
        match state.names.iter().position(|known| *known == name) {
            Some(index) => unsafe { *ids.add(i) = index as i32 + 1 },
            None => {
                unsafe { *ids.add(i) = DISPID_UNKNOWN };
                return DISP_E_UNKNOWNNAME;
            }
        }
    }
    S_OK
}

#[allow(clippy::too_many_arguments)]
unsafe extern "system" fn fake_invoke(
    this: *mut c_void,
    dispid: i32,
    _riid: *const Guid,
    lcid: u32,
    flags: u16,
    params: *mut RawDispParams,
    result: *mut RawVariant,
    _excep_info: *mut c_void,
    _arg_err: *mut u32,
) -> HResult {
    let params = unsafe { &*params };
    let args: Vec<(u16, usize)> = if params.c_args == 0 || params.rgvarg.is_null() {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(params.rgvarg, params.c_args as usize) }
            .iter()
            .map(|v| (v.vt, v.data[0]))
            .collect()
    };

    let reply = {
        let mut state = unsafe { object(this) }.state.borrow_mut();
        state.calls.push(RecordedCall {
            dispid,
            flags,
            lcid,
            named_args: params.c_named_args,
            args: args.clone(),
        });
        state.replies.pop_front()
    };

    let ret = match reply {
        None => return DISP_E_EXCEPTION,
        Some(FakeReply::Fail(hr)) => return hr,
        Some(FakeReply::Empty) => {
            unsafe { *result = RawVariant::default() };
            return S_OK;
        }
        Some(FakeReply::Value(ret)) => ret,
        Some(FakeReply::Read { ret, size, payload, filename }) => {
            if args.len() != 3 {
                return DISP_E_BADPARAMCOUNT;
            }
            let bytes_ref = VT_BYREF | VT_UI1;
            if args[0].0 != bytes_ref || args[1].0 != (VT_BYREF | VT_I4) || args[2].0 != bytes_ref {
                return DISP_E_TYPEMISMATCH;
            }
            let name = &filename[..filename.len().min(FILENAME_CAPACITY)];
            unsafe {
                std::ptr::copy_nonoverlapping(payload.as_ptr(), args[2].1 as *mut u8, payload.len());
                *(args[1].1 as *mut i32) = size;
                std::ptr::copy_nonoverlapping(name.as_ptr(), args[0].1 as *mut u8, name.len());
            }
            ret
        }
    };

    unsafe { *result = RawVariant::new(VT_I4, ret as u32 as usize) };
    S_OK
}

/// Simulated clock. Sleeping advances time instantly; clones share state.
#[derive(Debug, Clone)]
pub struct FakeClock {
    start: Instant,
    elapsed: Rc<Cell<Duration>>,
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Rc::new(Cell::new(Duration::ZERO)),
            sleeps: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }

    /// Every duration passed to [`Clock::sleep`], in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed.get()
    }

    fn utc_now(&self) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + self.elapsed.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        self.advance(duration);
    }
}

/// Build a read outcome the way the buffered reader would report it.
pub fn record(ret: i32, size: i32, text: &str) -> ReadOutcome {
    ReadOutcome {
        ret,
        size,
        text: text.to_string(),
        filename: if size > 0 { "RA2024.jvd".to_string() } else { String::new() },
        capacity: crate::reader::DEFAULT_CAPACITY,
        ..ReadOutcome::default()
    }
}

/// [`JvLink`] that replays scripted return codes.
///
/// Status and read scripts repeat their last entry once exhausted. Each call
/// advances the attached clock by a small fixed cost so deadline loops always
/// terminate.
pub struct ScriptedLink {
    clock: FakeClock,
    call_cost: Duration,
    pub init_ret: i32,
    pub ui_ret: i32,
    pub open: OpenOutcome,
    pub close_ret: i32,
    statuses: VecDeque<i32>,
    reads: VecDeque<ReadOutcome>,
    faults: HashMap<&'static str, usize>,
    counts: HashMap<&'static str, usize>,
    log: Vec<&'static str>,
}

impl ScriptedLink {
    pub fn new(clock: FakeClock) -> Self {
        Self {
            clock,
            call_cost: Duration::from_millis(10),
            init_ret: 0,
            ui_ret: 0,
            open: OpenOutcome {
                ret: 0,
                readcount: 3,
                downloadcount: 0,
                lastfiletimestamp: "20240102030405".to_string(),
            },
            close_ret: 0,
            statuses: VecDeque::from([0]),
            reads: VecDeque::from([record(0, 12, "RA1202401010")]),
            faults: HashMap::new(),
            counts: HashMap::new(),
            log: Vec::new(),
        }
    }

    pub fn open_ret(mut self, ret: i32) -> Self {
        self.open.ret = ret;
        self
    }

    pub fn statuses(mut self, statuses: impl IntoIterator<Item = i32>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn reads(mut self, reads: impl IntoIterator<Item = ReadOutcome>) -> Self {
        self.reads = reads.into_iter().collect();
        self
    }

    /// Fail the `nth` (0-based) call to `method` with `DISP_E_EXCEPTION`.
    pub fn fault_on(mut self, method: &'static str, nth: usize) -> Self {
        self.faults.insert(method, nth);
        self
    }

    /// Method names in call order.
    pub fn calls(&self) -> &[&'static str] {
        &self.log
    }

    pub fn count(&self, method: &str) -> usize {
        self.log.iter().filter(|m| **m == method).count()
    }

    fn enter(&mut self, method: &'static str) -> Result<()> {
        self.clock.advance(self.call_cost);
        self.log.push(method);
        let n = self.counts.entry(method).or_insert(0);
        let index = *n;
        *n += 1;
        if self.faults.get(method) == Some(&index) {
            return Err(BridgeError::remote_invocation(method, DISP_E_EXCEPTION));
        }
        Ok(())
    }

    fn next<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
        if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() }
    }
}

impl JvLink for ScriptedLink {
    fn init(&mut self, _sid: i32) -> Result<i32> {
        self.enter("JVInit")?;
        Ok(self.init_ret)
    }

    fn set_save_path(&mut self, _path: &str) -> Result<i32> {
        self.enter("JVSetSavePath")?;
        Ok(0)
    }

    fn set_save_flag(&mut self, _flag: bool) -> Result<i32> {
        self.enter("JVSetSaveFlag")?;
        Ok(0)
    }

    fn set_pay_flag(&mut self, _flag: bool) -> Result<i32> {
        self.enter("JVSetPayFlag")?;
        Ok(0)
    }

    fn set_ui_properties(&mut self) -> Result<i32> {
        self.enter("JVSetUIProperties")?;
        Ok(self.ui_ret)
    }

    fn open(&mut self, _request: &OpenRequest<'_>) -> Result<OpenOutcome> {
        self.enter("JVOpen")?;
        Ok(self.open.clone())
    }

    fn status(&mut self) -> Result<i32> {
        self.enter("JVStatus")?;
        Ok(Self::next(&mut self.statuses).unwrap_or(0))
    }

    fn read(&mut self) -> Result<ReadOutcome> {
        self.enter("JVRead")?;
        Ok(Self::next(&mut self.reads).unwrap_or_else(|| record(-1, 0, "")))
    }

    fn close(&mut self) -> Result<i32> {
        self.enter("JVClose")?;
        Ok(self.close_ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_sleep_advances_time() {
        let clock = FakeClock::new();
        let start = clock.now();
        clock.sleep(Duration::from_millis(500));
        assert_eq!(clock.now() - start, Duration::from_millis(500));
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(500)]);
        assert_eq!(clock.utc_now(), OffsetDateTime::UNIX_EPOCH + Duration::from_millis(500));
    }

    #[test]
    fn scripted_link_repeats_last_entry() {
        let mut link = ScriptedLink::new(FakeClock::new()).statuses([2, 1]);
        assert_eq!(link.status().unwrap(), 2);
        assert_eq!(link.status().unwrap(), 1);
        assert_eq!(link.status().unwrap(), 1);
        assert_eq!(link.count("JVStatus"), 3);
    }

    #[test]
    fn scripted_faults_fire_once() {
        let mut link = ScriptedLink::new(FakeClock::new()).fault_on("JVStatus", 1);
        assert!(link.status().is_ok());
        assert!(link.status().is_err());
        assert!(link.status().is_ok());
    }

    #[test]
    fn read_reply_rejects_wrong_arity() {
        let fake = FakeDispatch::new(&["JVRead"]);
        fake.push_reply(FakeReply::read(0, 1, b"A", b""));
        let dispatch = fake.dispatch();
        let id = dispatch.resolve("JVRead").unwrap();

        let signature = crate::dispatch::MethodSignature::new("JVRead", &[]);
        let frame = crate::dispatch::CallFrame::new(&signature);
        let err = unsafe { dispatch.invoke(id, &frame) }.unwrap_err();
        assert_eq!(err.hresult(), Some(DISP_E_BADPARAMCOUNT));
    }
}
