//! Device capability introspection
//!
//! Every control request can fail on its own (unsupported by the driver,
//! permission denied, not an evdev node at all). Each failure degrades to a
//! default for that one field and introspection carries on with the rest.

use log::{debug, trace};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use crate::device::ioctl::{self, AbsInfo, InputId};
use crate::event::codes;

/// Buffer size for the name/phys/uniq string requests
const STRING_BUF_LEN: usize = 256;

/// Bytes in the event-type bitmap
pub const EV_BITS_LEN: usize = codes::EV_MAX as usize / 8 + 1;

/// Bytes in a per-type code bitmap (sized for the largest code space)
pub const CODE_BITS_LEN: usize = codes::KEY_MAX as usize / 8 + 1;

/// Bytes in the property bitmap
pub const PROP_BITS_LEN: usize = (codes::INPUT_PROP_MAX as usize + 7) / 8;

/// Which identification string to query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringQuery {
    Name,
    Phys,
    Uniq,
}

/// The control requests introspection needs from an open device
pub trait ControlRequests {
    fn input_id(&self) -> io::Result<InputId>;
    /// Fill `buf` with a NUL-padded string
    fn query_string(&self, which: StringQuery, buf: &mut [u8]) -> io::Result<()>;
    fn driver_version(&self) -> io::Result<i32>;
    fn properties(&self, buf: &mut [u8]) -> io::Result<()>;
    fn effect_count(&self) -> io::Result<i32>;
    /// `ev_type == 0` asks for the bitmap of supported event types
    fn event_bits(&self, ev_type: u16, buf: &mut [u8]) -> io::Result<()>;
    fn abs_info(&self, code: u16) -> io::Result<AbsInfo>;
}

impl ControlRequests for File {
    fn input_id(&self) -> io::Result<InputId> {
        let mut id = InputId::default();
        ioctl::ioctl_with_mut_arg(self.as_raw_fd(), ioctl::EVIOCGID, &mut id, "EVIOCGID")?;
        Ok(id)
    }

    fn query_string(&self, which: StringQuery, buf: &mut [u8]) -> io::Result<()> {
        let (cmd, name) = match which {
            StringQuery::Name => (ioctl::eviocgname(buf.len()), "EVIOCGNAME"),
            StringQuery::Phys => (ioctl::eviocgphys(buf.len()), "EVIOCGPHYS"),
            StringQuery::Uniq => (ioctl::eviocguniq(buf.len()), "EVIOCGUNIQ"),
        };
        ioctl::ioctl_read_buf(self.as_raw_fd(), cmd, buf, name).map(|_| ())
    }

    fn driver_version(&self) -> io::Result<i32> {
        let mut version: libc::c_int = 0;
        ioctl::ioctl_with_mut_arg(
            self.as_raw_fd(),
            ioctl::EVIOCGVERSION,
            &mut version,
            "EVIOCGVERSION",
        )?;
        Ok(version)
    }

    fn properties(&self, buf: &mut [u8]) -> io::Result<()> {
        let cmd = ioctl::eviocgprop(buf.len());
        ioctl::ioctl_read_buf(self.as_raw_fd(), cmd, buf, "EVIOCGPROP").map(|_| ())
    }

    fn effect_count(&self) -> io::Result<i32> {
        let mut count: libc::c_int = 0;
        ioctl::ioctl_with_mut_arg(
            self.as_raw_fd(),
            ioctl::EVIOCGEFFECTS,
            &mut count,
            "EVIOCGEFFECTS",
        )?;
        Ok(count)
    }

    fn event_bits(&self, ev_type: u16, buf: &mut [u8]) -> io::Result<()> {
        let cmd = ioctl::eviocgbit(ev_type, buf.len());
        ioctl::ioctl_read_buf(self.as_raw_fd(), cmd, buf, "EVIOCGBIT").map(|_| ())
    }

    fn abs_info(&self, code: u16) -> io::Result<AbsInfo> {
        if !codes::is_abs_axis(code) {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        let mut info = AbsInfo::default();
        ioctl::ioctl_with_mut_arg(self.as_raw_fd(), ioctl::eviocgabs(code), &mut info, "EVIOCGABS")?;
        Ok(info)
    }
}

/// Calibrated range of one absolute axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisCapability {
    pub minimum: i32,
    pub maximum: i32,
    pub fuzz: i32,
    pub flat: i32,
    pub resolution: i32,
}

impl AxisCapability {
    /// Build from a kernel absinfo; `None` if the range is inverted
    pub fn from_abs_info(info: &AbsInfo) -> Option<Self> {
        if info.minimum > info.maximum {
            return None;
        }
        Some(Self {
            minimum: info.minimum,
            maximum: info.maximum,
            fuzz: info.fuzz,
            flat: info.flat,
            resolution: info.resolution,
        })
    }

    /// Map a raw value onto [-1.0, 1.0].
    ///
    /// The kernel does not clamp reported values, so clamp to the declared
    /// range first, then scale around the range midpoint by half its width.
    pub fn normalize(&self, value: i32) -> f32 {
        if self.maximum == self.minimum {
            return 0.0;
        }
        let value = value.clamp(self.minimum, self.maximum) as f64;
        let min = self.minimum as f64;
        let max = self.maximum as f64;
        let half = (max - min) / 2.0;
        let center = min + half;
        ((value - center) / half).clamp(-1.0, 1.0) as f32
    }
}

/// One declared capability: an axis carries its calibration, everything
/// else is a plain presence marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Present,
    Axis(AxisCapability),
}

/// event type -> event code -> capability
pub type CapabilityMap = BTreeMap<u16, BTreeMap<u16, Capability>>;

/// Identity strings and numbers reported by the driver
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceIdentity {
    pub bus_type: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
    pub name: String,
    pub phys: String,
    pub uniq: String,
    pub driver_version: i32,
    pub properties: BTreeSet<u16>,
    pub num_effects: i32,
}

/// Everything known about an open device; immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub path: PathBuf,
    pub identity: DeviceIdentity,
    pub capabilities: CapabilityMap,
}

impl DeviceInfo {
    /// Introspect an open device
    pub fn query(path: &Path, dev: &impl ControlRequests) -> Self {
        let identity = identity(dev);
        let capabilities = capabilities(dev);
        debug!(
            "{}: \"{}\" bus={:#06x} vendor={:#06x} product={:#06x} types={:?}",
            path.display(),
            identity.name,
            identity.bus_type,
            identity.vendor,
            identity.product,
            capabilities.keys().collect::<Vec<_>>()
        );
        Self {
            path: path.to_path_buf(),
            identity,
            capabilities,
        }
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    /// Check if the device declared an event type at all
    pub fn has_type(&self, ev_type: u16) -> bool {
        self.capabilities.contains_key(&ev_type)
    }

    /// Check if the device declared a specific type/code pair
    pub fn supports(&self, ev_type: u16, code: u16) -> bool {
        self.capabilities
            .get(&ev_type)
            .map(|c| c.contains_key(&code))
            .unwrap_or(false)
    }

    /// Calibration for an absolute axis
    pub fn axis(&self, code: u16) -> Option<&AxisCapability> {
        match self.capabilities.get(&codes::EV_ABS)?.get(&code)? {
            Capability::Axis(axis) => Some(axis),
            Capability::Present => None,
        }
    }
}

/// Bit `i` of a byte-array bitmap
#[inline]
pub fn test_bit(bits: &[u8], i: usize) -> bool {
    bits.get(i / 8).map(|b| (b >> (i % 8)) & 1 == 1).unwrap_or(false)
}

/// Indices of the set bits in `0..limit`
pub fn set_bits(bits: &[u8], limit: u16) -> impl Iterator<Item = u16> + '_ {
    (0..limit).filter(move |&i| test_bit(bits, i as usize))
}

/// Query a NUL-padded identification string
fn read_string(dev: &impl ControlRequests, which: StringQuery) -> Option<String> {
    let mut buf = [0u8; STRING_BUF_LEN];
    dev.query_string(which, &mut buf).ok()?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Some(String::from_utf8_lossy(&buf[..end]).into_owned())
}

/// Identity, strings, driver version, properties and effect count
pub fn identity(dev: &impl ControlRequests) -> DeviceIdentity {
    let id = dev.input_id().unwrap_or_default();

    let name = read_string(dev, StringQuery::Name)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("Device {}", id.product));
    let phys = read_string(dev, StringQuery::Phys).unwrap_or_default();
    let uniq = read_string(dev, StringQuery::Uniq).unwrap_or_default();
    let driver_version = dev.driver_version().unwrap_or(0);

    let mut prop_bits = [0u8; PROP_BITS_LEN];
    let properties = match dev.properties(&mut prop_bits) {
        Ok(()) => set_bits(&prop_bits, codes::INPUT_PROP_MAX).collect(),
        Err(_) => BTreeSet::new(),
    };

    let num_effects = dev.effect_count().unwrap_or(0);

    DeviceIdentity {
        bus_type: id.bustype,
        vendor: id.vendor,
        product: id.product,
        version: id.version,
        name,
        phys,
        uniq,
        driver_version,
        properties,
        num_effects,
    }
}

/// Walk the type bitmap, then each type's code bitmap, then the axis
/// calibration of every absolute axis.
///
/// A failed type bitmap yields an empty map; a failed code bitmap skips
/// only that type; a failed absinfo skips only that axis.
pub fn capabilities(dev: &impl ControlRequests) -> CapabilityMap {
    let mut map = CapabilityMap::new();

    let mut ev_bits = [0u8; EV_BITS_LEN];
    if let Err(e) = dev.event_bits(0, &mut ev_bits) {
        trace!("event type bitmap unavailable: {}", e);
        return map;
    }

    for ev_type in set_bits(&ev_bits, codes::EV_MAX) {
        let mut code_bits = [0u8; CODE_BITS_LEN];
        if let Err(e) = dev.event_bits(ev_type, &mut code_bits) {
            trace!("code bitmap for type {:#x} unavailable: {}", ev_type, e);
            continue;
        }

        let limit = if ev_type == codes::EV_ABS {
            codes::ABS_MAX + 1
        } else {
            codes::KEY_MAX
        };

        let mut event_codes = BTreeMap::new();
        for code in set_bits(&code_bits, limit) {
            if ev_type != codes::EV_ABS {
                event_codes.insert(code, Capability::Present);
                continue;
            }
            match dev.abs_info(code) {
                Ok(info) => match AxisCapability::from_abs_info(&info) {
                    Some(axis) => {
                        event_codes.insert(code, Capability::Axis(axis));
                    }
                    None => trace!("axis {:#x} has an inverted range, skipped", code),
                },
                Err(e) => trace!("absinfo for axis {:#x} unavailable: {}", code, e),
            }
        }
        map.insert(ev_type, event_codes);
    }

    map
}
