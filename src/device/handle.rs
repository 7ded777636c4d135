//! Open device with a dedicated read thread
//!
//! Each handle owns one device node and one reader thread. The thread
//! waits in `poll(2)` on the device and on a private wake socket, reads one
//! record at a time, runs it through the handle's filter and sends whatever
//! passes to the shared event channel.
//!
//! Lifecycle:
//! - `open` introspects the device and starts the thread immediately
//! - the thread exits on a read error (unplug), a malformed record, or close
//! - `close` wakes the thread, joins it, and only then drops the descriptor

use log::{debug, info, trace, warn};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::device::caps::DeviceInfo;
use crate::device::ff::ForceFeedback;
use crate::device::gate::Gate;
use crate::device::ioctl;
use crate::error::{Error, Result};
use crate::event::{codes, EventRecord, RECORD_SIZE};

/// Back-off after a read that returned no bytes
const EMPTY_READ_BACKOFF: Duration = Duration::from_millis(10);

/// What a device class forwards for one accepted record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Full triple (generic devices)
    Typed { ev_type: u16, code: u16, value: i32 },
    /// Code and value only (keyboards, mice, joysticks)
    Code { code: u16, value: i32 },
}

/// Decides whether a record is forwarded, and in what shape
pub type EventFilter = Arc<dyn Fn(&EventRecord) -> Option<Payload> + Send + Sync>;

/// An accepted event on its way to the consumer
#[derive(Debug, Clone)]
pub struct DeviceEvent {
    pub device: Arc<DeviceInfo>,
    pub record: EventRecord,
    pub payload: Payload,
}

impl DeviceEvent {
    /// `(type, code, value)` regardless of the payload shape
    pub fn parts(&self) -> (u16, u16, i32) {
        (self.record.ev_type, self.record.code, self.record.value)
    }

    /// Axis value mapped onto [-1.0, 1.0] using the device's calibration
    pub fn normalized(&self) -> Option<f32> {
        if self.record.ev_type != codes::EV_ABS {
            return None;
        }
        self.device
            .axis(self.record.code)
            .map(|axis| axis.normalize(self.record.value))
    }
}

/// Options applied when opening a device
#[derive(Debug, Clone, Copy, Default)]
pub struct HandleOptions {
    /// Take exclusive access with EVIOCGRAB
    pub grab: bool,
}

/// One open device and its reader thread
pub struct DeviceHandle {
    info: Arc<DeviceInfo>,
    /// `None` once closed
    file: Option<Arc<File>>,
    gate: Arc<Gate>,
    alive: Arc<AtomicBool>,
    waker: UnixStream,
    thread: Option<JoinHandle<()>>,
}

impl DeviceHandle {
    /// Open a device node and start reading it.
    ///
    /// Tries read/write first (needed for force feedback) and falls back to
    /// read-only. A failure here may be transient for a node that was just
    /// created, so callers should treat `DeviceUnavailable` as retryable.
    pub fn open(
        path: &Path,
        filter: EventFilter,
        sender: Sender<DeviceEvent>,
        options: HandleOptions,
    ) -> Result<Self> {
        let file = open_node(path).map_err(|source| Error::DeviceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;

        if options.grab {
            if let Err(e) = ioctl::ioctl_with_int_arg(file.as_raw_fd(), ioctl::EVIOCGRAB, 1, "EVIOCGRAB") {
                warn!("{}: exclusive grab failed: {}", path.display(), e);
            }
        }

        let info = Arc::new(DeviceInfo::query(path, &file));
        let file = Arc::new(file);
        let gate = Arc::new(Gate::new());
        let alive = Arc::new(AtomicBool::new(true));
        let (waker, wake_rx) = UnixStream::pair()?;
        wake_rx.set_nonblocking(true)?;

        let reader = ReadLoop {
            info: info.clone(),
            file: file.clone(),
            gate: gate.clone(),
            alive: alive.clone(),
            wake: wake_rx,
            filter,
            sender,
        };
        let name = format!("evhub-{}", file_label(path));
        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || reader.run())?;

        info!("Input device opened: {} ({})", path.display(), info.name());
        Ok(Self {
            info,
            file: Some(file),
            gate,
            alive,
            waker,
            thread: Some(thread),
        })
    }

    pub fn path(&self) -> &Path {
        &self.info.path
    }

    pub fn info(&self) -> &Arc<DeviceInfo> {
        &self.info
    }

    /// Discard events until `resume`
    pub fn pause(&self) {
        self.gate.pause();
    }

    /// Deliver events again; nothing read while paused is replayed
    pub fn resume(&self) {
        self.gate.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }

    /// True while the reader thread is running
    pub fn is_connected(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Force-feedback controls, if the device declared EV_FF and is still open
    pub fn force_feedback(&self) -> Option<ForceFeedback<'_>> {
        ForceFeedback::new(self.file.as_deref()?, &self.info)
    }

    /// Stop the reader thread and release the device.
    ///
    /// Safe to call from any thread other than the reader, and more than
    /// once. Returns after the thread has been joined.
    pub fn close(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.gate.close();
        if let Err(e) = (&self.waker).write(&[1]) {
            trace!("{}: wake write failed: {}", self.path().display(), e);
        }
        if thread.join().is_err() {
            warn!("{}: reader thread panicked", self.path().display());
        }
        self.alive.store(false, Ordering::SeqCst);
        // The reader's clone went with the thread; this releases the fd and any grab
        self.file.take();
        info!("Input device closed: {}", self.path().display());
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("path", &self.info.path)
            .field("name", &self.info.name())
            .field("connected", &self.is_connected())
            .field("paused", &self.is_paused())
            .finish()
    }
}

fn open_node(path: &Path) -> io::Result<File> {
    match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            debug!("{}: read/write denied, opening read-only", path.display());
            OpenOptions::new().read(true).open(path)
        }
        Err(e) => Err(e),
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "device".to_string())
}

/// Result of waiting on the device and the wake socket
#[derive(Debug, PartialEq, Eq)]
enum Readiness {
    Readable,
    Woken,
    Hangup,
    Idle,
}

/// `poll(2)` on the device fd and the wake fd
fn wait_readable(device: RawFd, wake: RawFd, timeout_ms: libc::c_int) -> io::Result<Readiness> {
    let mut fds = [
        libc::pollfd {
            fd: device,
            events: libc::POLLIN,
            revents: 0,
        },
        libc::pollfd {
            fd: wake,
            events: libc::POLLIN,
            revents: 0,
        },
    ];
    let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
    if ret < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(Readiness::Idle);
        }
        return Err(err);
    }
    if ret == 0 {
        return Ok(Readiness::Idle);
    }
    if fds[1].revents != 0 {
        return Ok(Readiness::Woken);
    }
    if fds[0].revents & libc::POLLIN != 0 {
        return Ok(Readiness::Readable);
    }
    if fds[0].revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0 {
        return Ok(Readiness::Hangup);
    }
    Ok(Readiness::Idle)
}

/// State moved into the reader thread
struct ReadLoop {
    info: Arc<DeviceInfo>,
    file: Arc<File>,
    gate: Arc<Gate>,
    alive: Arc<AtomicBool>,
    wake: UnixStream,
    filter: EventFilter,
    sender: Sender<DeviceEvent>,
}

/// Why the reader stopped
enum Exit {
    Closed,
    Disconnected(io::Error),
    Malformed(Error),
}

impl ReadLoop {
    fn run(self) {
        let path = self.info.path.display().to_string();
        match self.read_events() {
            Exit::Closed => debug!("{}: reader stopped", path),
            Exit::Disconnected(e) => info!("Input device disconnected: {} ({})", path, e),
            Exit::Malformed(e) => warn!("{}: {}, dropping device", path, e),
        }
        self.alive.store(false, Ordering::SeqCst);
    }

    fn read_events(&self) -> Exit {
        let device = self.file.as_raw_fd();
        let wake = self.wake.as_raw_fd();
        let mut buf = [0u8; RECORD_SIZE];

        loop {
            match wait_readable(device, wake, -1) {
                Ok(Readiness::Readable) => {}
                Ok(Readiness::Woken) => {
                    self.drain_wake();
                    if self.gate.is_closed() {
                        return Exit::Closed;
                    }
                    continue;
                }
                Ok(Readiness::Hangup) => {
                    return Exit::Disconnected(io::Error::from_raw_os_error(libc::ENODEV))
                }
                Ok(Readiness::Idle) => continue,
                Err(e) => return Exit::Disconnected(e),
            }

            let record = match self.read_record(&mut buf) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    if !self.gate.sleep(EMPTY_READ_BACKOFF) {
                        return Exit::Closed;
                    }
                    continue;
                }
                Err(exit) => return exit,
            };

            if self.gate.is_paused() {
                trace!("{}: discarding event while paused", self.info.path.display());
                if !self.gate.wait_open() {
                    return Exit::Closed;
                }
                if let Err(exit) = self.discard_pending(&mut buf) {
                    return exit;
                }
                continue;
            }

            if let Some(payload) = (self.filter)(&record) {
                // A dropped receiver means nobody listens; keep draining the device
                let _ = self.sender.send(DeviceEvent {
                    device: self.info.clone(),
                    record,
                    payload,
                });
            }
        }
    }

    /// Read one record; `Ok(None)` when the read returned nothing
    fn read_record(&self, buf: &mut [u8; RECORD_SIZE]) -> std::result::Result<Option<EventRecord>, Exit> {
        let n = loop {
            match (&*self.file).read(buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break 0,
                Err(e) => return Err(Exit::Disconnected(e)),
            }
        };
        EventRecord::decode(&buf[..n]).map_err(Exit::Malformed)
    }

    /// Throw away records the kernel queued while the handle was paused
    fn discard_pending(&self, buf: &mut [u8; RECORD_SIZE]) -> std::result::Result<(), Exit> {
        let device = self.file.as_raw_fd();
        let wake = self.wake.as_raw_fd();
        loop {
            match wait_readable(device, wake, 0) {
                Ok(Readiness::Readable) => {
                    if self.read_record(buf)?.is_none() {
                        return Ok(());
                    }
                }
                Ok(Readiness::Hangup) => {
                    return Err(Exit::Disconnected(io::Error::from_raw_os_error(libc::ENODEV)))
                }
                Ok(_) => return Ok(()),
                Err(e) => return Err(Exit::Disconnected(e)),
            }
        }
    }

    fn drain_wake(&self) {
        let mut scratch = [0u8; 16];
        while let Ok(n) = (&self.wake).read(&mut scratch) {
            if n == 0 {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::mpsc::{self, Receiver};
    use std::time::Instant;

    use crate::testutil::{fifo_dir, open_fd_count, write_record};

    fn accept_all() -> EventFilter {
        Arc::new(|r: &EventRecord| {
            Some(Payload::Typed {
                ev_type: r.ev_type,
                code: r.code,
                value: r.value,
            })
        })
    }

    fn open_fifo(name: &str) -> (crate::testutil::TempDir, PathBuf, DeviceHandle, Receiver<DeviceEvent>) {
        let dir = fifo_dir(&[name]);
        let path = dir.path().join(name);
        let (tx, rx) = mpsc::channel();
        let handle = DeviceHandle::open(&path, accept_all(), tx, HandleOptions::default()).unwrap();
        (dir, path, handle, rx)
    }

    #[test]
    fn test_events_are_forwarded_in_order() {
        let (_dir, path, handle, rx) = open_fifo("event0");
        assert!(handle.is_connected());
        // Not an evdev node: every control request fails and defaults apply
        assert_eq!(handle.info().name(), "Device 0");
        assert!(handle.info().capabilities.is_empty());

        for value in 1..=3 {
            write_record(&path, &EventRecord::new(codes::EV_KEY, codes::BTN_A, value).encode());
        }
        for expected in 1..=3 {
            let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            assert_eq!(event.parts(), (codes::EV_KEY, codes::BTN_A, expected));
            assert_eq!(event.device.path, path);
        }
    }

    #[test]
    fn test_filter_drops_rejected_records() {
        let dir = fifo_dir(&["event1"]);
        let path = dir.path().join("event1");
        let (tx, rx) = mpsc::channel();
        let keys_only: EventFilter = Arc::new(|r: &EventRecord| {
            (r.ev_type == codes::EV_KEY).then_some(Payload::Code {
                code: r.code,
                value: r.value,
            })
        });
        let _handle = DeviceHandle::open(&path, keys_only, tx, HandleOptions::default()).unwrap();

        write_record(&path, &EventRecord::new(codes::EV_REL, codes::REL_X, 5).encode());
        write_record(&path, &EventRecord::new(codes::EV_KEY, codes::KEY_ENTER, 1).encode());

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(
            event.payload,
            Payload::Code {
                code: codes::KEY_ENTER,
                value: 1
            }
        );
    }

    #[test]
    fn test_events_during_pause_are_dropped() {
        let (_dir, path, handle, rx) = open_fifo("event2");

        write_record(&path, &EventRecord::new(codes::EV_KEY, codes::BTN_A, 1).encode());
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap().record.value, 1);

        handle.pause();
        handle.pause();
        assert!(handle.is_paused());
        write_record(&path, &EventRecord::new(codes::EV_KEY, codes::BTN_A, 2).encode());
        write_record(&path, &EventRecord::new(codes::EV_KEY, codes::BTN_A, 3).encode());
        thread::sleep(Duration::from_millis(200));
        assert!(rx.try_recv().is_err());

        handle.resume();
        thread::sleep(Duration::from_millis(100));
        write_record(&path, &EventRecord::new(codes::EV_KEY, codes::BTN_A, 4).encode());
        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event.record.value, 4);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_close_unblocks_idle_reader() {
        let (_dir, _path, mut handle, _rx) = open_fifo("event3");
        thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        handle.close();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(!handle.is_connected());
        // Second close is a no-op
        handle.close();
    }

    #[test]
    fn test_close_releases_descriptor() {
        let (_dir, path, mut handle, _rx) = open_fifo("event7");
        assert_eq!(open_fd_count(&path), 1);

        handle.close();
        assert_eq!(open_fd_count(&path), 0);
        assert!(handle.force_feedback().is_none());
    }

    #[test]
    fn test_close_unblocks_paused_reader() {
        let (_dir, path, mut handle, _rx) = open_fifo("event4");
        handle.pause();
        write_record(&path, &EventRecord::new(codes::EV_KEY, codes::BTN_A, 1).encode());
        thread::sleep(Duration::from_millis(100));

        let start = Instant::now();
        handle.close();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(!handle.is_connected());
    }

    #[test]
    fn test_malformed_record_kills_reader() {
        let (_dir, path, handle, _rx) = open_fifo("event5");
        let mut writer = OpenOptions::new().write(true).open(&path).unwrap();
        writer.write_all(&[0u8; 5]).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while handle.is_connected() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!handle.is_connected());
    }

    #[test]
    fn test_open_missing_node_is_unavailable() {
        let (tx, _rx) = mpsc::channel();
        let err = DeviceHandle::open(
            Path::new("/nonexistent/event0"),
            accept_all(),
            tx,
            HandleOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::DeviceUnavailable { .. }));
    }

    #[test]
    fn test_no_force_feedback_without_capability() {
        let (_dir, _path, handle, _rx) = open_fifo("event6");
        assert!(handle.force_feedback().is_none());
    }
}
