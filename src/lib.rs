//! evhub - evdev input device hub for Linux
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  Registry (per class) ← notify (inotify) │
//! │     ↓ open / reconcile                   │
//! │  DeviceHandle × N  (reader threads)      │
//! │     ↓ mpsc                               │
//! │  InputHub consumer → EventSink           │
//! └──────────────────────────────────────────┘
//! ```

pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod event;
pub mod hub;
pub mod registry;

#[cfg(test)]
mod testutil;

pub use config::Config;
pub use device::{DeviceEvent, DeviceHandle, DeviceInfo, Payload};
pub use error::{Error, Result};
pub use event::EventRecord;
pub use hub::{EventSink, InputHub};
pub use registry::{DeviceClass, Registry, RegistrySettings};
