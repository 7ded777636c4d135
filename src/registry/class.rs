//! Device classes
//!
//! A class is the policy half of a registry: which directory to watch,
//! which entries in it are devices, and which records those devices
//! forward. The mechanism (open, read, hotplug) is shared.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::device::handle::{EventFilter, Payload};
use crate::event::{codes, EventRecord};

/// Decides whether a directory entry name is a candidate device
pub type NamePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct DeviceClass {
    pub name: &'static str,
    pub root: PathBuf,
    pub predicate: NamePredicate,
    pub filter: EventFilter,
}

impl DeviceClass {
    pub fn new(
        name: &'static str,
        root: impl Into<PathBuf>,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
        filter: impl Fn(&EventRecord) -> Option<Payload> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            root: root.into(),
            predicate: Arc::new(predicate),
            filter: Arc::new(filter),
        }
    }

    /// Every event node: `eventN` directly, or a `*-event-*` symlink
    pub fn generic(root: impl Into<PathBuf>) -> Self {
        Self::new(
            "generic",
            root,
            |name| name.starts_with("event") || name.contains("-event-"),
            |r| {
                Some(Payload::Typed {
                    ev_type: r.ev_type,
                    code: r.code,
                    value: r.value,
                })
            },
        )
    }

    /// Keyboards from the by-path directory, key events only
    pub fn keyboard(by_path_root: impl Into<PathBuf>) -> Self {
        Self::new(
            "keyboard",
            by_path_root,
            |name| name.ends_with("-event-kbd"),
            |r| (r.ev_type == codes::EV_KEY).then(|| code_payload(r)),
        )
    }

    /// Mice from the by-path directory, buttons and relative motion
    pub fn mouse(by_path_root: impl Into<PathBuf>) -> Self {
        Self::new(
            "mouse",
            by_path_root,
            |name| name.ends_with("-event-mouse"),
            |r| matches!(r.ev_type, codes::EV_KEY | codes::EV_REL).then(|| code_payload(r)),
        )
    }

    /// Joysticks and gamepads: gamepad buttons and absolute axes
    pub fn joystick(root: impl Into<PathBuf>) -> Self {
        Self::new("joystick", root, |name| name.starts_with("event"), |r| {
            let accepted = match r.ev_type {
                codes::EV_KEY => codes::is_gamepad_button(r.code),
                codes::EV_ABS => codes::is_abs_axis(r.code),
                _ => false,
            };
            accepted.then(|| code_payload(r))
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        (self.predicate)(name)
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn code_payload(r: &EventRecord) -> Payload {
    Payload::Code {
        code: r.code,
        value: r.value,
    }
}

impl std::fmt::Debug for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceClass")
            .field("name", &self.name)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}
