//! Input hub
//!
//! Owns one registry per enabled device class and a single consumer thread.
//! Every reader thread sends into one channel; the consumer hands events to
//! the sink one at a time, so the sink never runs concurrently with itself.

use log::{info, warn};
use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::Config;
use crate::device::caps::DeviceInfo;
use crate::device::handle::{DeviceEvent, DeviceHandle};
use crate::error::Result;
use crate::registry::{DeviceClass, Registry, RegistrySettings};

/// Receives every accepted event, on the hub's consumer thread
pub trait EventSink: Send + 'static {
    fn on_event(&mut self, event: &DeviceEvent);
}

impl<F> EventSink for F
where
    F: FnMut(&DeviceEvent) + Send + 'static,
{
    fn on_event(&mut self, event: &DeviceEvent) {
        self(event)
    }
}

/// Classes switched on in `[classes]`, rooted per `[discovery]`
pub fn enabled_classes(config: &Config) -> Vec<DeviceClass> {
    let discovery = &config.discovery;
    let mut classes = Vec::new();
    if config.classes.generic {
        classes.push(DeviceClass::generic(&discovery.input_root));
    }
    if config.classes.keyboard {
        classes.push(DeviceClass::keyboard(&discovery.by_path_root));
    }
    if config.classes.mouse {
        classes.push(DeviceClass::mouse(&discovery.by_path_root));
    }
    if config.classes.joystick {
        classes.push(DeviceClass::joystick(&discovery.input_root));
    }
    classes
}

pub struct InputHub {
    registries: Vec<Registry>,
    sender: Option<Sender<DeviceEvent>>,
    consumer: Option<JoinHandle<()>>,
}

impl InputHub {
    /// Start the classes enabled in `config`
    pub fn start(config: &Config, sink: impl EventSink) -> Result<Self> {
        Self::with_classes(enabled_classes(config), RegistrySettings::from_config(config), sink)
    }

    pub fn with_classes(
        classes: Vec<DeviceClass>,
        settings: RegistrySettings,
        mut sink: impl EventSink,
    ) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<DeviceEvent>();
        let consumer = thread::Builder::new()
            .name("evhub-consumer".to_string())
            .spawn(move || {
                for event in receiver {
                    sink.on_event(&event);
                }
            })?;

        let mut registries = Vec::with_capacity(classes.len());
        for class in classes {
            registries.push(Registry::new(class, settings, sender.clone())?);
        }
        info!("Input hub started with {} registries", registries.len());

        Ok(Self {
            registries,
            sender: Some(sender),
            consumer: Some(consumer),
        })
    }

    pub fn registries(&self) -> &[Registry] {
        &self.registries
    }

    pub fn pause_all(&self) {
        for registry in &self.registries {
            registry.pause();
        }
    }

    pub fn resume_all(&self) {
        for registry in &self.registries {
            registry.resume();
        }
    }

    /// Every tracked device across all classes
    pub fn list_devices(&self) -> Vec<Arc<DeviceInfo>> {
        self.registries.iter().flat_map(|r| r.devices()).collect()
    }

    /// Run `f` against the first handle tracking `path`
    pub fn with_device<R>(&self, path: &Path, f: impl FnOnce(&DeviceHandle) -> R) -> Option<R> {
        let mut f = Some(f);
        for registry in &self.registries {
            let found = registry.with_device(path, |handle| f.take().map(|f| f(handle)));
            if let Some(result) = found.flatten() {
                return Some(result);
            }
        }
        None
    }

    /// Stop every registry and device, then drain and stop the consumer.
    ///
    /// Events already queued are still delivered before this returns.
    pub fn close_all(&mut self) {
        for registry in self.registries.drain(..) {
            registry.shutdown();
        }
        self.sender.take();
        if let Some(consumer) = self.consumer.take() {
            if consumer.join().is_err() {
                warn!("Event consumer panicked");
            }
            info!("Input hub stopped");
        }
    }
}

impl Drop for InputHub {
    fn drop(&mut self) {
        self.close_all();
    }
}
