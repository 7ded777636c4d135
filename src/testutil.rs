//! Fixtures for tests: temporary directories of FIFOs standing in for
//! device nodes. Shared with the integration tests through `#[path]`, so
//! nothing here names crate types.

use nix::sys::stat::Mode;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

/// Directory removed on drop
pub struct TempDir(PathBuf);

impl TempDir {
    pub fn new(tag: &str) -> Self {
        let n = NEXT_DIR.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!("evhub-{}-{}-{}", tag, std::process::id(), n));
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(&path).unwrap();
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

pub fn make_fifo(path: &Path) {
    nix::unistd::mkfifo(path, Mode::from_bits_truncate(0o600)).unwrap();
}

/// A fresh directory holding one FIFO per name
pub fn fifo_dir(names: &[&str]) -> TempDir {
    let dir = TempDir::new("fifo");
    for name in names {
        make_fifo(&dir.path().join(name));
    }
    dir
}

/// Write encoded records into a FIFO that a reader already holds open
pub fn write_record(path: &Path, bytes: &[u8]) {
    let mut fifo = OpenOptions::new().write(true).open(path).unwrap();
    fifo.write_all(bytes).unwrap();
}

/// Descriptors of this process currently open on `path`
pub fn open_fd_count(path: &Path) -> usize {
    std::fs::read_dir("/proc/self/fd")
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| std::fs::read_link(entry.path()).map(|target| target == path).unwrap_or(false))
        .count()
}
