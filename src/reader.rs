//! Buffered `JVRead` through raw pointer arguments.
//!
//! Each attempt allocates fresh zeroed buffers, hands their addresses to
//! `JVRead` as `VT_BYREF | VT_UI1` arguments and drops them before returning.
//! When the component reports more bytes than the buffer holds, the read is
//! re-issued with a larger buffer, up to [`MAX_CAPACITY`].
//!
//! The re-issue assumes JV-Link delivers the same record again after a
//! too-small-buffer report rather than advancing to the next one. This has not
//! been verified against the component.

use crate::codec::TextCodec;
use crate::dispatch::{ArgSlot, CallFrame, DispatchId, RawDispatch};
use crate::methods::JV_READ;
use crate::Result;
use tracing::{debug, trace, warn};

/// Initial record buffer capacity (1 MiB).
pub const DEFAULT_CAPACITY: usize = 1024 * 1024;
/// Capacity ceiling for growth retries (8 MiB).
pub const MAX_CAPACITY: usize = 8 * 1024 * 1024;
/// Filename buffer capacity (`MAX_PATH`).
pub const FILENAME_CAPACITY: usize = 260;

const PREVIEW_BYTES: usize = 16;

/// Zeroed heap region handed to the component for one attempt.
struct RawBuffer {
    bytes: Box<[u8]>,
}

impl RawBuffer {
    fn zeroed(len: usize) -> Self {
        Self { bytes: vec![0u8; len].into_boxed_slice() }
    }

    fn as_mut_ptr(&mut self) -> *mut u8 {
        self.bytes.as_mut_ptr()
    }

    fn head(&self, len: usize) -> &[u8] {
        &self.bytes[..len.min(self.bytes.len())]
    }
}

/// Result of one logical `JVRead`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadOutcome {
    /// `JVRead` return code.
    pub ret: i32,
    /// Size reported through the `size` argument.
    pub size: i32,
    /// Record text decoded from the buffer.
    pub text: String,
    /// File name decoded from the filename buffer.
    pub filename: String,
    /// Capacity of the buffer that produced this outcome.
    pub capacity: usize,
    /// Bytes reported but not decoded because the capacity ceiling was reached.
    pub truncated: Option<usize>,
    /// Set when the record or filename contained malformed sequences.
    pub decode_error: Option<String>,
    /// Number of growth retries before this outcome.
    pub growth_retries: u32,
    /// Hex dump of the first record bytes.
    pub head_hex: String,
}

/// What one attempt concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStep {
    Complete(ReadOutcome),
    NeedsLargerBuffer { reported: i32, new_capacity: usize },
}

/// Reads records through `JVRead` with a growable buffer.
#[derive(Debug, Clone)]
pub struct BufferedReader {
    dispatch_id: DispatchId,
    codec: TextCodec,
    initial_capacity: usize,
    max_capacity: usize,
}

impl BufferedReader {
    pub fn new(dispatch_id: DispatchId, codec: TextCodec) -> Self {
        Self { dispatch_id, codec, initial_capacity: DEFAULT_CAPACITY, max_capacity: MAX_CAPACITY }
    }

    /// Override the capacity limits. `initial` is clamped to `1..=max`.
    pub fn with_capacity_limits(mut self, initial: usize, max: usize) -> Self {
        let max = max.max(1);
        self.initial_capacity = initial.clamp(1, max);
        self.max_capacity = max;
        self
    }

    /// VARIANT types of the `JVRead` arguments in declared order, taken from
    /// the same frame layout every attempt uses.
    pub fn argument_types() -> Vec<&'static str> {
        let null = std::ptr::null_mut();
        read_frame(null, null.cast(), null)
            .map(|frame| frame.declared_types())
            .unwrap_or_default()
    }

    /// Read one record, growing the buffer as needed.
    pub fn read(&self, dispatch: &RawDispatch<'_>) -> Result<ReadOutcome> {
        let mut capacity = self.initial_capacity;
        let mut growth_retries = 0;

        loop {
            match self.read_once(dispatch, capacity)? {
                ReadStep::Complete(mut outcome) => {
                    outcome.growth_retries = growth_retries;
                    return Ok(outcome);
                }
                ReadStep::NeedsLargerBuffer { reported, new_capacity } => {
                    debug!(
                        reported,
                        capacity, new_capacity, "Record larger than buffer, growing and re-reading"
                    );
                    capacity = new_capacity;
                    growth_retries += 1;
                }
            }
        }
    }

    /// One `JVRead` call with a buffer of `capacity` bytes.
    pub fn read_once(&self, dispatch: &RawDispatch<'_>, capacity: usize) -> Result<ReadStep> {
        let mut buff = RawBuffer::zeroed(capacity + 1);
        let mut filename = RawBuffer::zeroed(FILENAME_CAPACITY + 1);
        let mut size: i32 = 0;

        let frame = read_frame(buff.as_mut_ptr(), &raw mut size, filename.as_mut_ptr())?;
        trace!(capacity, args = %frame.preview(), "CALL JVRead");

        // SAFETY: all three buffers outlive the call and are sized as JVRead expects
        let ret = unsafe { dispatch.invoke(self.dispatch_id, &frame)? };

        trace!(ret, size, capacity, "JVRead returned");

        let name = self.codec.decode_until_nul(filename.head(FILENAME_CAPACITY));

        if size < 0 {
            debug!(ret, size, "Negative size, returning empty record");
            return Ok(ReadStep::Complete(ReadOutcome {
                ret,
                size,
                filename: name.text,
                capacity,
                decode_error: name.had_errors.then(|| "filename: malformed sequence".to_string()),
                ..ReadOutcome::default()
            }));
        }

        let reported = size as usize;
        let mut truncated = None;
        if reported > capacity {
            let new_capacity = (reported + 1).min(self.max_capacity);
            if new_capacity > capacity {
                return Ok(ReadStep::NeedsLargerBuffer { reported: size, new_capacity });
            }
            warn!(size, capacity, "Record exceeds the capacity ceiling, truncating");
            truncated = Some(reported - capacity);
        }

        let len = reported.min(capacity);
        let head_hex = hex_preview(buff.head(len.min(PREVIEW_BYTES)));
        if len > 0 {
            debug!(head = %head_hex, "First record bytes");
        }

        let text = self.codec.decode(buff.head(len));
        let decode_error = match (text.had_errors, name.had_errors) {
            (false, false) => None,
            (true, false) => Some("buff: malformed sequence".to_string()),
            (false, true) => Some("filename: malformed sequence".to_string()),
            (true, true) => Some("buff, filename: malformed sequence".to_string()),
        };

        Ok(ReadStep::Complete(ReadOutcome {
            ret,
            size,
            text: text.text,
            filename: name.text,
            capacity,
            truncated,
            decode_error,
            growth_retries: 0,
            head_hex,
        }))
    }
}

fn read_frame(buff: *mut u8, size: *mut i32, filename: *mut u8) -> Result<CallFrame<'static>> {
    let mut frame = CallFrame::new(&JV_READ);
    frame
        .bind("buff", ArgSlot::BytesRef(buff))?
        .bind("size", ArgSlot::I32Ref(size))?
        .bind("filename", ArgSlot::BytesRef(filename))?;
    Ok(frame)
}

/// `93-8C-8B-9E` style preview of raw bytes.
pub fn hex_preview(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join("-")
}
