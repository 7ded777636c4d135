//! Directory notifications for hotplug
//!
//! Wraps a `notify` watcher on the discovery root and reduces its events to
//! the three kinds the registry acts on. Renames count as well: udev
//! publishes by-path symlinks by renaming a temporary link into place.

use log::{debug, trace, warn};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Created,
    AttributeChanged,
    Deleted,
}

/// One notification about a directory entry, by file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub name: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Translate one watcher event into zero or more notices
    pub fn from_event(event: &Event) -> Vec<Notice> {
        let kinds: &[NoticeKind] = match event.kind {
            EventKind::Create(_) => &[NoticeKind::Created],
            EventKind::Modify(ModifyKind::Metadata(_)) => &[NoticeKind::AttributeChanged],
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => &[NoticeKind::Deleted],
            // A link renamed into place is complete on arrival
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                &[NoticeKind::Created, NoticeKind::AttributeChanged]
            }
            // Repeats a From/To pair that was already reported
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => &[],
            EventKind::Remove(_) => &[NoticeKind::Deleted],
            _ => &[],
        };

        let mut notices = Vec::new();
        for path in &event.paths {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            notices.extend(kinds.iter().map(|&kind| Notice::new(kind, name)));
        }
        notices
    }
}

/// Watch `root` (non-recursively), sending notices to `tx`
pub fn watch(root: &Path, tx: Sender<Notice>) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            trace!("watch event: {:?}", event);
            for notice in Notice::from_event(&event) {
                // Receiver gone means the registry is shutting down
                let _ = tx.send(notice);
            }
        }
        Err(e) => warn!("Directory watch error: {}", e),
    })?;
    watcher.watch(root, RecursiveMode::NonRecursive)?;
    debug!("Watching {} for device nodes", root.display());
    Ok(watcher)
}

/// Wait up to `wait` for a notice, then let a burst settle and take the rest.
///
/// Returns an empty batch on timeout and `None` once every sender is gone.
pub fn collect_batch(rx: &Receiver<Notice>, wait: Duration, settle: Duration) -> Option<Vec<Notice>> {
    let first = match rx.recv_timeout(wait) {
        Ok(notice) => notice,
        Err(RecvTimeoutError::Timeout) => return Some(Vec::new()),
        Err(RecvTimeoutError::Disconnected) => return None,
    };
    if !settle.is_zero() {
        std::thread::sleep(settle);
    }
    let mut batch = vec![first];
    batch.extend(rx.try_iter());
    Some(batch)
}
