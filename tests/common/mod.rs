//! Shared fixtures: directories of FIFOs that stand in for /dev/input

#![allow(dead_code)]

#[path = "../../src/testutil.rs"]
mod testutil;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use evhub::EventRecord;

pub use testutil::open_fd_count;

/// A FIFO directory addressed by node name
pub struct DeviceDir(testutil::TempDir);

impl DeviceDir {
    pub fn new(names: &[&str]) -> Self {
        Self(testutil::fifo_dir(names))
    }

    pub fn path(&self) -> &Path {
        self.0.path()
    }

    pub fn node(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    pub fn add(&self, name: &str) {
        testutil::make_fifo(&self.node(name));
    }

    pub fn remove(&self, name: &str) {
        std::fs::remove_file(self.node(name)).unwrap();
    }

    pub fn write(&self, name: &str, record: EventRecord) {
        testutil::write_record(&self.node(name), &record.encode());
    }

    pub fn write_raw(&self, name: &str, bytes: &[u8]) {
        testutil::write_record(&self.node(name), bytes);
    }
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}
