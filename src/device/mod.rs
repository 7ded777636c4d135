//! Input devices
//!
//! - `caps`: identity and capability introspection
//! - `handle`: an open device with its reader thread
//! - `ff`: force-feedback controls
//! - `gate`: pause/close synchronisation for worker threads
//! - `ioctl`: EVIOC* request codes

pub mod caps;
pub mod ff;
pub mod gate;
pub mod handle;
pub mod ioctl;

pub use caps::{AxisCapability, Capability, CapabilityMap, DeviceIdentity, DeviceInfo};
pub use ff::{Effect, ForceFeedback, Waveform};
pub use gate::Gate;
pub use handle::{DeviceEvent, DeviceHandle, EventFilter, HandleOptions, Payload};
