//! [`JvLink`] over a live JV-Link `IDispatch`.

use crate::codec::TextCodec;
use crate::dispatch::{ArgSlot, CallFrame, DispatchId, MethodSignature, RawDispatch};
use crate::link::{JvLink, OpenOutcome, OpenRequest, ReadOutcome};
use crate::methods::{
    JV_CLOSE, JV_INIT, JV_OPEN, JV_READ, JV_SET_PAY_FLAG, JV_SET_SAVE_FLAG, JV_SET_SAVE_PATH,
    JV_SET_UI_PROPERTIES, JV_STATUS,
};
use crate::reader::BufferedReader;
use crate::Result;
use std::collections::HashMap;
use tracing::{debug, trace};
use windows_core::BSTR;

/// Calls JV-Link methods through cached dispatch ids and raw call frames.
pub struct DispatchLink<'a> {
    dispatch: RawDispatch<'a>,
    codec: TextCodec,
    ids: HashMap<&'static str, DispatchId>,
}

impl<'a> DispatchLink<'a> {
    pub fn new(dispatch: RawDispatch<'a>, codec: TextCodec) -> Self {
        debug!(code_page = codec.code_page(), encoding = codec.name(), "Decoding JVRead output");
        Self { dispatch, codec, ids: HashMap::new() }
    }

    fn id(&mut self, signature: &'static MethodSignature) -> Result<DispatchId> {
        if let Some(id) = self.ids.get(signature.name) {
            return Ok(*id);
        }
        let id = self.dispatch.resolve(signature.name)?;
        self.ids.insert(signature.name, id);
        Ok(id)
    }

    /// Invoke a method whose arguments are all passed by value.
    fn call(&mut self, signature: &'static MethodSignature, args: &[(&str, ArgSlot)]) -> Result<i32> {
        let id = self.id(signature)?;
        let mut frame = CallFrame::new(signature);
        for (param, slot) in args {
            frame.bind(param, *slot)?;
        }
        trace!(method = signature.name, args = %frame.preview(), "CALL");
        // SAFETY: by-value arguments carry no pointers; BSTRs outlive the call
        let ret = unsafe { self.dispatch.invoke(id, &frame)? };
        trace!(method = signature.name, ret, "RET");
        Ok(ret)
    }
}

impl JvLink for DispatchLink<'_> {
    fn init(&mut self, sid: i32) -> Result<i32> {
        self.call(&JV_INIT, &[("sid", ArgSlot::I32(sid))])
    }

    fn set_save_path(&mut self, path: &str) -> Result<i32> {
        trace!(savepath = path, "JVSetSavePath argument");
        let path = BSTR::from(path);
        self.call(&JV_SET_SAVE_PATH, &[("savepath", ArgSlot::Bstr(path.as_ptr()))])
    }

    fn set_save_flag(&mut self, flag: bool) -> Result<i32> {
        self.call(&JV_SET_SAVE_FLAG, &[("saveflag", ArgSlot::Bool(flag))])
    }

    fn set_pay_flag(&mut self, flag: bool) -> Result<i32> {
        self.call(&JV_SET_PAY_FLAG, &[("payflag", ArgSlot::Bool(flag))])
    }

    fn set_ui_properties(&mut self) -> Result<i32> {
        self.call(&JV_SET_UI_PROPERTIES, &[])
    }

    fn open(&mut self, request: &OpenRequest<'_>) -> Result<OpenOutcome> {
        let id = self.id(&JV_OPEN)?;
        let dataspec = BSTR::from(request.dataspec);
        let fromtime = BSTR::from(request.fromdate);
        let mut readcount: i32 = 0;
        let mut downloadcount: i32 = 0;
        let mut timestamp: *mut u16 = std::ptr::null_mut();

        let mut frame = CallFrame::new(&JV_OPEN);
        frame
            .bind("dataspec", ArgSlot::Bstr(dataspec.as_ptr()))?
            .bind("fromtime", ArgSlot::Bstr(fromtime.as_ptr()))?
            .bind("option", ArgSlot::I32(request.option))?
            .bind("readcount", ArgSlot::I32Ref(&raw mut readcount))?
            .bind("downloadcount", ArgSlot::I32Ref(&raw mut downloadcount))?
            .bind("lastfiletimestamp", ArgSlot::BstrRef(&raw mut timestamp))?;

        trace!(
            method = JV_OPEN.name,
            dataspec = request.dataspec,
            fromtime = request.fromdate,
            args = %frame.preview(),
            "CALL"
        );
        // SAFETY: every bound pointer refers to a local that outlives the call
        let result = unsafe { self.dispatch.invoke(id, &frame) };
        // SAFETY: the callee hands ownership of any BSTR it stored to the caller
        let lastfiletimestamp = unsafe { BSTR::from_raw(timestamp) }.to_string();
        let ret = result?;
        trace!(method = JV_OPEN.name, ret, readcount, downloadcount, %lastfiletimestamp, "RET");

        Ok(OpenOutcome { ret, readcount, downloadcount, lastfiletimestamp })
    }

    fn status(&mut self) -> Result<i32> {
        self.call(&JV_STATUS, &[])
    }

    fn read(&mut self) -> Result<ReadOutcome> {
        let id = self.id(&JV_READ)?;
        BufferedReader::new(id, self.codec).read(&self.dispatch)
    }

    fn close(&mut self) -> Result<i32> {
        self.call(&JV_CLOSE, &[])
    }
}
