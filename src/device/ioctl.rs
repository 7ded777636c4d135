//! evdev control requests
//!
//! Request codes for the EVIOC* family plus thin wrappers around
//! `libc::ioctl` that turn the C return convention into `io::Result`.

use log::trace;
use std::io;
use std::mem::size_of;
use std::os::unix::io::RawFd;

// evdev ioctl constants (include/uapi/linux/input.h)
//
// Fixed-size requests are computed at compile time; the variable-length
// ones (strings, bitmaps) take the caller's buffer length.
const EVDEV_IOCTL_BASE: u8 = b'E';

pub const EVIOCGVERSION: libc::c_ulong =
    nix::request_code_read!(EVDEV_IOCTL_BASE, 0x01, size_of::<libc::c_int>()) as libc::c_ulong;
pub const EVIOCGID: libc::c_ulong =
    nix::request_code_read!(EVDEV_IOCTL_BASE, 0x02, size_of::<InputId>()) as libc::c_ulong;
pub const EVIOCSFF: libc::c_ulong = nix::request_code_write!(
    EVDEV_IOCTL_BASE,
    0x80,
    size_of::<crate::device::ff::FfEffect>()
) as libc::c_ulong;
pub const EVIOCRMFF: libc::c_ulong =
    nix::request_code_write!(EVDEV_IOCTL_BASE, 0x81, size_of::<libc::c_int>()) as libc::c_ulong;
pub const EVIOCGEFFECTS: libc::c_ulong =
    nix::request_code_read!(EVDEV_IOCTL_BASE, 0x84, size_of::<libc::c_int>()) as libc::c_ulong;
pub const EVIOCGRAB: libc::c_ulong =
    nix::request_code_write!(EVDEV_IOCTL_BASE, 0x90, size_of::<libc::c_int>()) as libc::c_ulong;

/// EVIOCGNAME(len)
pub fn eviocgname(len: usize) -> libc::c_ulong {
    nix::request_code_read!(EVDEV_IOCTL_BASE, 0x06, len) as libc::c_ulong
}

/// EVIOCGPHYS(len)
pub fn eviocgphys(len: usize) -> libc::c_ulong {
    nix::request_code_read!(EVDEV_IOCTL_BASE, 0x07, len) as libc::c_ulong
}

/// EVIOCGUNIQ(len)
pub fn eviocguniq(len: usize) -> libc::c_ulong {
    nix::request_code_read!(EVDEV_IOCTL_BASE, 0x08, len) as libc::c_ulong
}

/// EVIOCGPROP(len)
pub fn eviocgprop(len: usize) -> libc::c_ulong {
    nix::request_code_read!(EVDEV_IOCTL_BASE, 0x09, len) as libc::c_ulong
}

/// EVIOCGBIT(ev, len): ev = 0 returns the event-type bitmap
pub fn eviocgbit(ev_type: u16, len: usize) -> libc::c_ulong {
    nix::request_code_read!(EVDEV_IOCTL_BASE, 0x20 + ev_type as u8, len) as libc::c_ulong
}

/// EVIOCGABS(abs)
///
/// Only valid for `abs <= ABS_MAX`; larger numbers alias other requests.
pub fn eviocgabs(abs: u16) -> libc::c_ulong {
    nix::request_code_read!(EVDEV_IOCTL_BASE, 0x40 + abs as u8, size_of::<AbsInfo>())
        as libc::c_ulong
}

/// struct input_id
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputId {
    pub bustype: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

/// struct input_absinfo: value, minimum, maximum, fuzz, flat, resolution
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbsInfo {
    pub value: i32,
    pub minimum: i32,
    pub maximum: i32,
    pub fuzz: i32,
    pub flat: i32,
    pub resolution: i32,
}

fn check(ret: libc::c_int, fd: RawFd, cmd_name: &str) -> io::Result<libc::c_int> {
    if ret < 0 {
        let err = io::Error::last_os_error();
        trace!("{} failed on fd {}: {}", cmd_name, fd, err);
        Err(err)
    } else {
        Ok(ret)
    }
}

/// Execute an ioctl command with a mutable argument.
///
/// # Safety
/// The caller must ensure the argument type matches what the ioctl
/// expects; the kernel writes `size_of::<T>()` bytes at most.
pub fn ioctl_with_mut_arg<T>(
    fd: RawFd,
    cmd: libc::c_ulong,
    arg: &mut T,
    cmd_name: &str,
) -> io::Result<libc::c_int> {
    let ret = unsafe { libc::ioctl(fd, cmd, arg as *mut T) };
    check(ret, fd, cmd_name)
}

/// Execute a variable-length read ioctl into a byte buffer.
///
/// `cmd` must encode `buf.len()` as its size; returns the kernel's
/// return value (bytes copied for the string requests).
pub fn ioctl_read_buf(
    fd: RawFd,
    cmd: libc::c_ulong,
    buf: &mut [u8],
    cmd_name: &str,
) -> io::Result<libc::c_int> {
    let ret = unsafe { libc::ioctl(fd, cmd, buf.as_mut_ptr()) };
    check(ret, fd, cmd_name)
}

/// Execute an ioctl command with an integer argument passed by value.
pub fn ioctl_with_int_arg(
    fd: RawFd,
    cmd: libc::c_ulong,
    arg: libc::c_int,
    cmd_name: &str,
) -> io::Result<()> {
    let ret = unsafe { libc::ioctl(fd, cmd, arg) };
    check(ret, fd, cmd_name).map(|_| ())
}
