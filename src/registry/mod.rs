//! Device registry
//!
//! Tracks every device of one class under a discovery root and keeps the
//! set current as nodes come and go. A watch thread consumes directory
//! notices and reconciles the tracked handles against the directory.
//!
//! Hotplug protocol:
//! - `Created` marks a name as pending
//! - `AttributeChanged` on a pending name retries opening it until it
//!   succeeds (udev fixes permissions after creation), then reconciles
//! - `Deleted` reconciles right away

pub mod class;
pub mod hotplug;

use log::{debug, info, warn};
use notify::RecommendedWatcher;
use std::collections::{BTreeSet, HashSet};
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::Config;
use crate::constants;
use crate::device::caps::DeviceInfo;
use crate::device::gate::Gate;
use crate::device::handle::{DeviceEvent, DeviceHandle, HandleOptions};
use crate::error::Result;

pub use class::{DeviceClass, NamePredicate};
pub use hotplug::{Notice, NoticeKind};

/// Hotplug timing and open options for one registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySettings {
    pub wait_timeout: Duration,
    pub settle_delay: Duration,
    pub retry_interval: Duration,
    /// Open attempts per pending node; 0 retries until the registry closes
    pub retry_limit: u32,
    pub grab: bool,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_millis(constants::HOTPLUG_WAIT_TIMEOUT_MS),
            settle_delay: Duration::from_millis(constants::HOTPLUG_SETTLE_DELAY_MS),
            retry_interval: Duration::from_millis(constants::HOTPLUG_RETRY_INTERVAL_MS),
            retry_limit: constants::HOTPLUG_RETRY_LIMIT,
            grab: false,
        }
    }
}

impl RegistrySettings {
    pub fn from_config(config: &Config) -> Self {
        let hotplug = &config.hotplug;
        Self {
            wait_timeout: Duration::from_millis(hotplug.wait_timeout_ms),
            settle_delay: Duration::from_millis(hotplug.settle_delay_ms),
            retry_interval: Duration::from_millis(hotplug.retry_interval_ms),
            retry_limit: hotplug.retry_limit,
            grab: config.discovery.grab,
        }
    }

    fn handle_options(&self) -> HandleOptions {
        HandleOptions { grab: self.grab }
    }
}

/// Entries of `root` accepted by `predicate`, as sorted full paths
pub fn list_candidates(root: &Path, predicate: impl Fn(&str) -> bool) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {}: {}", root.display(), e);
            return Vec::new();
        }
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_str().map(&predicate).unwrap_or(false))
        .map(|entry| entry.path())
        .collect();
    paths.sort();
    paths
}

/// Open every candidate of `class`; entries that fail to open are skipped
pub fn discover(class: &DeviceClass, sender: &Sender<DeviceEvent>, options: HandleOptions) -> Vec<DeviceHandle> {
    list_candidates(&class.root, |name| class.matches(name))
        .into_iter()
        .filter_map(|path| open_logged(class, &path, sender, options))
        .collect()
}

fn open_logged(
    class: &DeviceClass,
    path: &Path,
    sender: &Sender<DeviceEvent>,
    options: HandleOptions,
) -> Option<DeviceHandle> {
    match DeviceHandle::open(path, class.filter.clone(), sender.clone(), options) {
        Ok(handle) => Some(handle),
        Err(e) => {
            debug!("[{}] skipping {}: {}", class.name, path.display(), e);
            None
        }
    }
}

struct Tracked {
    handles: Vec<DeviceHandle>,
    paused: bool,
}

/// State shared between the registry and its watch thread
struct Shared {
    class: DeviceClass,
    settings: RegistrySettings,
    sender: Sender<DeviceEvent>,
    tracked: Mutex<Tracked>,
    gate: Gate,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Tracked> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop dead or vanished handles, then open whatever is new.
    ///
    /// The listing is taken under the lock: a listing older than the
    /// tracked set would close handles another pass just opened.
    fn reconcile(&self) {
        let mut tracked = self.lock();
        let present: BTreeSet<PathBuf> = list_candidates(&self.class.root, |name| self.class.matches(name))
            .into_iter()
            .collect();

        let (keep, gone): (Vec<_>, Vec<_>) = std::mem::take(&mut tracked.handles)
            .into_iter()
            .partition(|h| h.is_connected() && present.contains(h.path()));
        tracked.handles = keep;

        for mut handle in gone {
            info!("[{}] removing {}", self.class.name, handle.path().display());
            handle.close();
        }

        for path in &present {
            if tracked.handles.iter().any(|h| h.path() == path.as_path()) {
                continue;
            }
            if let Some(handle) = open_logged(&self.class, path, &self.sender, self.settings.handle_options()) {
                if tracked.paused {
                    handle.pause();
                }
                info!("[{}] added {} ({})", self.class.name, path.display(), handle.info().name());
                tracked.handles.push(handle);
            }
        }
    }

    /// Poll until `name` can be opened. `false` on give-up or close.
    fn wait_until_openable(&self, name: &str) -> bool {
        let path = self.class.path_for(name);
        let mut attempts: u32 = 0;
        loop {
            match OpenOptions::new()
                .read(true)
                .custom_flags(libc::O_NONBLOCK)
                .open(&path)
            {
                Ok(_) => return true,
                Err(e) => {
                    attempts += 1;
                    if self.settings.retry_limit != 0 && attempts >= self.settings.retry_limit {
                        warn!(
                            "[{}] giving up on {} after {} attempts: {}",
                            self.class.name,
                            path.display(),
                            attempts,
                            e
                        );
                        return false;
                    }
                }
            }
            if !self.gate.sleep(self.settings.retry_interval) {
                return false;
            }
        }
    }

    fn watch_loop(&self, notices: Receiver<Notice>) {
        let mut pending: HashSet<String> = HashSet::new();

        while self.gate.wait_open() {
            let Some(batch) = hotplug::collect_batch(
                &notices,
                self.settings.wait_timeout,
                self.settings.settle_delay,
            ) else {
                debug!("[{}] notification source closed", self.class.name);
                break;
            };

            for notice in batch {
                if self.gate.is_paused() || self.gate.is_closed() {
                    break;
                }
                debug!("[{}] {:?} {}", self.class.name, notice.kind, notice.name);
                match notice.kind {
                    NoticeKind::Created => {
                        if self.class.matches(&notice.name) {
                            pending.insert(notice.name);
                        }
                    }
                    NoticeKind::AttributeChanged => {
                        if pending.remove(&notice.name) && self.wait_until_openable(&notice.name) {
                            self.reconcile();
                        }
                    }
                    NoticeKind::Deleted => {
                        pending.remove(&notice.name);
                        self.reconcile();
                    }
                }
            }
        }
        debug!("[{}] watch loop stopped", self.class.name);
    }
}

/// Live set of devices for one class
pub struct Registry {
    shared: Arc<Shared>,
    watcher: Option<RecommendedWatcher>,
    thread: Option<JoinHandle<()>>,
}

impl Registry {
    /// Watch the class root, open every current device, start the watch thread.
    ///
    /// Fails with `WatchSetupFailed` if the root cannot be watched.
    pub fn new(class: DeviceClass, settings: RegistrySettings, sender: Sender<DeviceEvent>) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let watcher = hotplug::watch(&class.root, tx)?;
        let mut registry = Self::with_notices(class, settings, sender, rx)?;
        registry.watcher = Some(watcher);
        Ok(registry)
    }

    /// Like `new`, but fed by an arbitrary notice source instead of a
    /// filesystem watch
    pub fn with_notices(
        class: DeviceClass,
        settings: RegistrySettings,
        sender: Sender<DeviceEvent>,
        notices: Receiver<Notice>,
    ) -> Result<Self> {
        let handles = discover(&class, &sender, settings.handle_options());
        info!(
            "[{}] {} device(s) under {}",
            class.name,
            handles.len(),
            class.root.display()
        );

        let thread_name = format!("evhub-watch-{}", class.name);
        let shared = Arc::new(Shared {
            class,
            settings,
            sender,
            tracked: Mutex::new(Tracked {
                handles,
                paused: false,
            }),
            gate: Gate::new(),
        });

        let worker = shared.clone();
        let thread = thread::Builder::new()
            .name(thread_name)
            .spawn(move || worker.watch_loop(notices))?;

        Ok(Self {
            shared,
            watcher: None,
            thread: Some(thread),
        })
    }

    pub fn class(&self) -> &DeviceClass {
        &self.shared.class
    }

    /// Identity and capabilities of every tracked device
    pub fn devices(&self) -> Vec<Arc<DeviceInfo>> {
        self.shared.lock().handles.iter().map(|h| h.info().clone()).collect()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.shared
            .lock()
            .handles
            .iter()
            .map(|h| h.path().to_path_buf())
            .collect()
    }

    /// Run `f` against the handle tracking `path`, if any
    pub fn with_device<R>(&self, path: &Path, f: impl FnOnce(&DeviceHandle) -> R) -> Option<R> {
        let tracked = self.shared.lock();
        tracked.handles.iter().find(|h| h.path() == path).map(f)
    }

    /// Re-scan the root now
    pub fn reconcile(&self) {
        self.shared.reconcile();
    }

    /// Hold the watch loop and pause every device
    pub fn pause(&self) {
        self.shared.gate.pause();
        let mut tracked = self.shared.lock();
        tracked.paused = true;
        for handle in &tracked.handles {
            handle.pause();
        }
    }

    /// Resume every device, catch up on changes, then release the watch loop
    pub fn resume(&self) {
        {
            let mut tracked = self.shared.lock();
            tracked.paused = false;
            for handle in &tracked.handles {
                handle.resume();
            }
        }
        self.shared.reconcile();
        self.shared.gate.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.shared.gate.is_paused()
    }

    /// Stop watching and join the watch thread.
    ///
    /// Tracked devices stay open until `shutdown` or drop.
    pub fn close(&mut self) {
        self.shared.gate.close();
        self.watcher.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("[{}] watch thread panicked", self.shared.class.name);
            }
        }
    }

    /// Stop watching and close every tracked device
    pub fn shutdown(mut self) {
        self.close();
        let handles = std::mem::take(&mut self.shared.lock().handles);
        for mut handle in handles {
            handle.close();
        }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("class", &self.shared.class)
            .field("devices", &self.paths())
            .finish()
    }
}
