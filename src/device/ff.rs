//! Force feedback
//!
//! Effects are uploaded with EVIOCSFF and triggered by writing EV_FF
//! records back to the device node. Gain and autocenter are plain EV_FF
//! writes with a 0..=0xFFFF value.

use log::debug;
use std::fs::File;
use std::io::{self, Write};
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use crate::device::caps::DeviceInfo;
use crate::device::ioctl;
use crate::event::{codes, EventRecord};

/// struct ff_envelope
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct FfEnvelope {
    pub attack_length: u16,
    pub attack_level: u16,
    pub fade_length: u16,
    pub fade_level: u16,
}

/// struct ff_constant_effect
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct FfConstantEffect {
    pub level: i16,
    pub envelope: FfEnvelope,
}

/// struct ff_periodic_effect
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfPeriodicEffect {
    pub waveform: u16,
    pub period: u16,
    pub magnitude: i16,
    pub offset: i16,
    pub phase: u16,
    pub envelope: FfEnvelope,
    pub custom_len: u32,
    pub custom_data: *mut i16,
}

/// struct ff_rumble_effect
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct FfRumbleEffect {
    pub strong_magnitude: u16,
    pub weak_magnitude: u16,
}

/// The effect-specific part of struct ff_effect
#[repr(C)]
#[derive(Clone, Copy)]
pub union FfEffectParams {
    pub constant: FfConstantEffect,
    pub periodic: FfPeriodicEffect,
    pub rumble: FfRumbleEffect,
}

/// struct ff_trigger
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct FfTrigger {
    pub button: u16,
    pub interval: u16,
}

/// struct ff_replay
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct FfReplay {
    pub length: u16,
    pub delay: u16,
}

/// struct ff_effect
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FfEffect {
    pub kind: u16,
    pub id: i16,
    pub direction: u16,
    pub trigger: FfTrigger,
    pub replay: FfReplay,
    pub params: FfEffectParams,
}

impl FfEffect {
    fn zeroed() -> Self {
        // All-zero is a valid ff_effect (null custom_data pointer)
        unsafe { std::mem::zeroed() }
    }
}

/// Periodic waveform shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Square,
    Triangle,
    Sine,
    SawUp,
    SawDown,
}

impl Waveform {
    fn code(self) -> u16 {
        match self {
            Waveform::Square => codes::FF_SQUARE,
            Waveform::Triangle => codes::FF_TRIANGLE,
            Waveform::Sine => codes::FF_SINE,
            Waveform::SawUp => codes::FF_SAW_UP,
            Waveform::SawDown => codes::FF_SAW_DOWN,
        }
    }
}

/// An effect to upload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    Rumble {
        strong: u16,
        weak: u16,
        length: Duration,
    },
    Constant {
        level: i16,
        length: Duration,
    },
    Periodic {
        waveform: Waveform,
        period: Duration,
        magnitude: i16,
        length: Duration,
    },
}

impl Effect {
    /// The FF_* effect type code
    pub fn kind(&self) -> u16 {
        match self {
            Effect::Rumble { .. } => codes::FF_RUMBLE,
            Effect::Constant { .. } => codes::FF_CONSTANT,
            Effect::Periodic { .. } => codes::FF_PERIODIC,
        }
    }

    /// Kernel representation; `id == -1` asks for a new slot
    pub fn to_raw(&self, id: i16) -> FfEffect {
        let mut raw = FfEffect::zeroed();
        raw.kind = self.kind();
        raw.id = id;
        match *self {
            Effect::Rumble { strong, weak, length } => {
                raw.replay.length = millis(length);
                raw.params.rumble = FfRumbleEffect {
                    strong_magnitude: strong,
                    weak_magnitude: weak,
                };
            }
            Effect::Constant { level, length } => {
                raw.replay.length = millis(length);
                raw.params.constant = FfConstantEffect {
                    level,
                    envelope: FfEnvelope::default(),
                };
            }
            Effect::Periodic {
                waveform,
                period,
                magnitude,
                length,
            } => {
                raw.replay.length = millis(length);
                raw.params.periodic = FfPeriodicEffect {
                    waveform: waveform.code(),
                    period: millis(period),
                    magnitude,
                    offset: 0,
                    phase: 0,
                    envelope: FfEnvelope::default(),
                    custom_len: 0,
                    custom_data: std::ptr::null_mut(),
                };
            }
        }
        raw
    }
}

/// Effect durations are u16 milliseconds; longer values saturate
fn millis(d: Duration) -> u16 {
    u16::try_from(d.as_millis()).unwrap_or(u16::MAX)
}

/// Scale a percentage onto the 0..=0xFFFF EV_FF range
pub fn percent_to_level(percent: u8) -> i32 {
    0xFFFF * i32::from(percent.min(100)) / 100
}

/// Force-feedback controls of one open device
pub struct ForceFeedback<'a> {
    file: &'a File,
    info: &'a DeviceInfo,
}

impl<'a> ForceFeedback<'a> {
    /// `None` unless the device declared EV_FF
    pub fn new(file: &'a File, info: &'a DeviceInfo) -> Option<Self> {
        info.has_type(codes::EV_FF).then_some(Self { file, info })
    }

    /// Maximum number of simultaneously uploaded effects
    pub fn max_effects(&self) -> i32 {
        self.info.identity.num_effects
    }

    pub fn supports(&self, kind: u16) -> bool {
        self.info.supports(codes::EV_FF, kind)
    }

    fn write(&self, code: u16, value: i32) -> io::Result<()> {
        let record = EventRecord::new(codes::EV_FF, code, value);
        let mut file = self.file;
        file.write_all(&record.encode())
    }

    /// Start (`count > 0`, number of repetitions) or stop (`0`) an effect
    pub fn play_effect(&self, id: i16, count: i32) -> io::Result<()> {
        self.write(id as u16, count)
    }

    pub fn set_gain(&self, percent: u8) -> io::Result<()> {
        self.write(codes::FF_GAIN, percent_to_level(percent))
    }

    pub fn set_autocenter(&self, percent: u8) -> io::Result<()> {
        self.write(codes::FF_AUTOCENTER, percent_to_level(percent))
    }

    /// Upload an effect and return the slot id the kernel assigned
    pub fn upload_effect(&self, effect: &Effect) -> io::Result<i16> {
        if !self.supports(effect.kind()) {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("effect type {:#x} not supported by device", effect.kind()),
            ));
        }
        let mut raw = effect.to_raw(-1);
        ioctl::ioctl_with_mut_arg(self.file.as_raw_fd(), ioctl::EVIOCSFF, &mut raw, "EVIOCSFF")?;
        debug!(
            "{}: uploaded effect {:#x} as id {}",
            self.info.path.display(),
            raw.kind,
            raw.id
        );
        Ok(raw.id)
    }

    pub fn remove_effect(&self, id: i16) -> io::Result<()> {
        ioctl::ioctl_with_int_arg(
            self.file.as_raw_fd(),
            ioctl::EVIOCRMFF,
            libc::c_int::from(id),
            "EVIOCRMFF",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::caps::{Capability, DeviceIdentity};
    use std::collections::BTreeMap;
    use std::io::Read;
    use std::mem::size_of;
    use std::path::PathBuf;

    fn ff_info(kinds: &[u16]) -> DeviceInfo {
        let mut ff = BTreeMap::new();
        for &k in kinds {
            ff.insert(k, Capability::Present);
        }
        let mut capabilities = BTreeMap::new();
        capabilities.insert(codes::EV_FF, ff);
        DeviceInfo {
            path: PathBuf::from("/dev/input/event9"),
            identity: DeviceIdentity::default(),
            capabilities,
        }
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_ff_effect_layout() {
        assert_eq!(size_of::<FfEffect>(), 48);
        assert_eq!(size_of::<FfPeriodicEffect>(), 32);
    }

    #[test]
    #[cfg(target_arch = "x86_64")]
    fn test_eviocsff_request_code() {
        assert_eq!(ioctl::EVIOCSFF, 0x4030_4580);
        assert_eq!(ioctl::EVIOCRMFF, 0x4004_4581);
    }

    #[test]
    fn test_percent_to_level() {
        assert_eq!(percent_to_level(0), 0);
        assert_eq!(percent_to_level(50), 0x7FFF);
        assert_eq!(percent_to_level(100), 0xFFFF);
        assert_eq!(percent_to_level(250), 0xFFFF);
    }

    #[test]
    fn test_rumble_to_raw() {
        let effect = Effect::Rumble {
            strong: 0x8000,
            weak: 0x4000,
            length: Duration::from_millis(250),
        };
        let raw = effect.to_raw(-1);
        assert_eq!(raw.kind, codes::FF_RUMBLE);
        assert_eq!(raw.id, -1);
        assert_eq!(raw.replay.length, 250);
        let rumble = unsafe { raw.params.rumble };
        assert_eq!(rumble.strong_magnitude, 0x8000);
        assert_eq!(rumble.weak_magnitude, 0x4000);
    }

    #[test]
    fn test_long_duration_saturates() {
        let effect = Effect::Periodic {
            waveform: Waveform::Sine,
            period: Duration::from_millis(20),
            magnitude: 1000,
            length: Duration::from_secs(3600),
        };
        let raw = effect.to_raw(3);
        assert_eq!(raw.replay.length, u16::MAX);
        let periodic = unsafe { raw.params.periodic };
        assert_eq!(periodic.waveform, codes::FF_SINE);
        assert_eq!(periodic.period, 20);
    }

    #[test]
    fn test_no_controls_without_ev_ff() {
        let file = File::open("/dev/null").unwrap();
        let info = DeviceInfo {
            path: PathBuf::from("/dev/null"),
            identity: DeviceIdentity::default(),
            capabilities: BTreeMap::new(),
        };
        assert!(ForceFeedback::new(&file, &info).is_none());
    }

    #[test]
    fn test_upload_refuses_undeclared_kind() {
        let file = File::open("/dev/null").unwrap();
        let info = ff_info(&[codes::FF_RUMBLE]);
        let ff = ForceFeedback::new(&file, &info).unwrap();
        let err = ff
            .upload_effect(&Effect::Constant {
                level: 100,
                length: Duration::from_millis(10),
            })
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_gain_and_play_write_records() {
        let dir = crate::testutil::fifo_dir(&["event9"]);
        let path = dir.path().join("event9");
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();
        let info = ff_info(&[codes::FF_RUMBLE, codes::FF_GAIN]);
        let ff = ForceFeedback::new(&file, &info).unwrap();

        ff.set_gain(100).unwrap();
        ff.play_effect(2, 1).unwrap();

        let mut buf = [0u8; crate::event::RECORD_SIZE];
        (&file).read_exact(&mut buf).unwrap();
        let gain = EventRecord::decode(&buf).unwrap().unwrap();
        assert_eq!((gain.ev_type, gain.code, gain.value), (codes::EV_FF, codes::FF_GAIN, 0xFFFF));
        (&file).read_exact(&mut buf).unwrap();
        let play = EventRecord::decode(&buf).unwrap().unwrap();
        assert_eq!((play.ev_type, play.code, play.value), (codes::EV_FF, 2, 1));
    }
}
