//! Binary event record codec
//!
//! Mirrors `struct input_event` from <linux/input.h>:
//!
//! ```text
//! struct input_event {
//!     struct timeval time;   // long tv_sec, long tv_usec
//!     __u16 type;
//!     __u16 code;
//!     __s32 value;
//! };
//! ```
//!
//! Field widths and byte order are those of the host, so a record is 24
//! bytes on 64-bit targets and 16 bytes on 32-bit ones.

use chrono::{DateTime, Local, TimeZone};
use std::mem::size_of;

use crate::error::{Error, Result};
use crate::event::codes;

/// Width of one `long` field on this platform
const LONG: usize = size_of::<libc::c_long>();

/// Size in bytes of one encoded record
pub const RECORD_SIZE: usize = 2 * LONG + 2 + 2 + 4;

/// One decoded input event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventRecord {
    pub seconds: i64,
    pub microseconds: i64,
    pub ev_type: u16,
    pub code: u16,
    pub value: i32,
}

impl EventRecord {
    /// Build a record with a zero timestamp (the kernel stamps writes itself)
    pub fn new(ev_type: u16, code: u16, value: i32) -> Self {
        Self {
            seconds: 0,
            microseconds: 0,
            ev_type,
            code,
            value,
        }
    }

    /// Decode one record.
    ///
    /// Returns `Ok(None)` for an empty buffer (nothing was read), and
    /// `MalformedRecord` for any other length short of [`RECORD_SIZE`].
    /// Bytes past the first record are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Option<Self>> {
        if bytes.is_empty() {
            return Ok(None);
        }
        if bytes.len() < RECORD_SIZE {
            return Err(Error::MalformedRecord { len: bytes.len() });
        }

        let seconds = read_long(&bytes[0..LONG]);
        let microseconds = read_long(&bytes[LONG..2 * LONG]);
        let tail = &bytes[2 * LONG..RECORD_SIZE];

        Ok(Some(Self {
            seconds,
            microseconds,
            ev_type: u16::from_ne_bytes([tail[0], tail[1]]),
            code: u16::from_ne_bytes([tail[2], tail[3]]),
            value: i32::from_ne_bytes([tail[4], tail[5], tail[6], tail[7]]),
        }))
    }

    /// Encode into exactly [`RECORD_SIZE`] bytes
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        out[0..LONG].copy_from_slice(&(self.seconds as libc::c_long).to_ne_bytes());
        out[LONG..2 * LONG].copy_from_slice(&(self.microseconds as libc::c_long).to_ne_bytes());
        let tail = &mut out[2 * LONG..];
        tail[0..2].copy_from_slice(&self.ev_type.to_ne_bytes());
        tail[2..4].copy_from_slice(&self.code.to_ne_bytes());
        tail[4..8].copy_from_slice(&self.value.to_ne_bytes());
        out
    }

    /// Kernel timestamp as local wall-clock time
    ///
    /// evdev stamps events with CLOCK_REALTIME unless a client switched
    /// the clock with EVIOCSCLOCKID, so this is only meaningful by default.
    pub fn timestamp(&self) -> Option<DateTime<Local>> {
        let nanos = u32::try_from(self.microseconds.checked_mul(1000)?).ok()?;
        Local.timestamp_opt(self.seconds, nanos).single()
    }

    /// True for the SYN_REPORT-style frame separators
    #[inline]
    pub fn is_sync(&self) -> bool {
        self.ev_type == codes::EV_SYN
    }
}

fn read_long(bytes: &[u8]) -> i64 {
    let mut raw = [0u8; LONG];
    raw.copy_from_slice(bytes);
    libc::c_long::from_ne_bytes(raw) as i64
}
