//! evdev protocol constants
//!
//! Event types, codes and limits from <linux/input.h> and
//! <linux/input-event-codes.h>. Only the values the crate acts on are listed;
//! everything else travels through as a plain number.

// ============================================================================
// Event Types
// ============================================================================

/// Synchronization marker
pub const EV_SYN: u16 = 0x00;

/// Keys and buttons
pub const EV_KEY: u16 = 0x01;

/// Relative axes (mouse motion, wheels)
pub const EV_REL: u16 = 0x02;

/// Absolute axes (sticks, triggers, touch)
pub const EV_ABS: u16 = 0x03;

/// Miscellaneous
pub const EV_MSC: u16 = 0x04;

/// Binary switches (lid, headphone jack)
pub const EV_SW: u16 = 0x05;

/// LEDs
pub const EV_LED: u16 = 0x11;

/// Sound output (beep)
pub const EV_SND: u16 = 0x12;

/// Autorepeat settings
pub const EV_REP: u16 = 0x14;

/// Force feedback
pub const EV_FF: u16 = 0x15;

/// Power button
pub const EV_PWR: u16 = 0x16;

/// Force feedback status
pub const EV_FF_STATUS: u16 = 0x17;

/// Highest event type
pub const EV_MAX: u16 = 0x1f;

// ============================================================================
// Keys and Buttons
// ============================================================================

pub const KEY_ESC: u16 = 1;
pub const KEY_ENTER: u16 = 28;
pub const KEY_UP: u16 = 103;
pub const KEY_DOWN: u16 = 108;

/// First joystick button (BTN_TRIGGER)
pub const BTN_JOYSTICK: u16 = 0x120;

/// First gamepad button (BTN_A / BTN_SOUTH)
pub const BTN_GAMEPAD: u16 = 0x130;
pub const BTN_A: u16 = 0x130;
pub const BTN_B: u16 = 0x131;

pub const BTN_LEFT: u16 = 0x110;
pub const BTN_RIGHT: u16 = 0x111;
pub const BTN_MIDDLE: u16 = 0x112;

/// First code after the joystick/gamepad/digitizer/wheel button blocks
pub const KEY_OK: u16 = 0x160;

/// Highest key code
pub const KEY_MAX: u16 = 0x2ff;

// ============================================================================
// Relative Axes
// ============================================================================

pub const REL_X: u16 = 0x00;
pub const REL_Y: u16 = 0x01;
pub const REL_WHEEL: u16 = 0x08;
pub const REL_MAX: u16 = 0x0f;

// ============================================================================
// Absolute Axes
// ============================================================================

pub const ABS_X: u16 = 0x00;
pub const ABS_Y: u16 = 0x01;
pub const ABS_Z: u16 = 0x02;
pub const ABS_RX: u16 = 0x03;
pub const ABS_RY: u16 = 0x04;
pub const ABS_RZ: u16 = 0x05;
pub const ABS_HAT0X: u16 = 0x10;
pub const ABS_HAT0Y: u16 = 0x11;

/// Highest absolute axis code
pub const ABS_MAX: u16 = 0x3f;

// ============================================================================
// Input Properties
// ============================================================================

pub const INPUT_PROP_POINTER: u16 = 0x00;
pub const INPUT_PROP_DIRECT: u16 = 0x01;
pub const INPUT_PROP_BUTTONPAD: u16 = 0x02;
pub const INPUT_PROP_SEMI_MT: u16 = 0x03;
pub const INPUT_PROP_TOPBUTTONPAD: u16 = 0x04;
pub const INPUT_PROP_POINTING_STICK: u16 = 0x05;
pub const INPUT_PROP_ACCELEROMETER: u16 = 0x06;

/// Highest input property
pub const INPUT_PROP_MAX: u16 = 0x1f;

// ============================================================================
// Bus Types
// ============================================================================

pub const BUS_PCI: u16 = 0x01;
pub const BUS_USB: u16 = 0x03;
pub const BUS_BLUETOOTH: u16 = 0x05;
pub const BUS_I8042: u16 = 0x11;
pub const BUS_HOST: u16 = 0x19;
pub const BUS_VIRTUAL: u16 = 0x06;

// ============================================================================
// Force Feedback
// ============================================================================

pub const FF_RUMBLE: u16 = 0x50;
pub const FF_PERIODIC: u16 = 0x51;
pub const FF_CONSTANT: u16 = 0x52;
pub const FF_SPRING: u16 = 0x53;
pub const FF_FRICTION: u16 = 0x54;
pub const FF_DAMPER: u16 = 0x55;
pub const FF_INERTIA: u16 = 0x56;
pub const FF_RAMP: u16 = 0x57;

pub const FF_SQUARE: u16 = 0x58;
pub const FF_TRIANGLE: u16 = 0x59;
pub const FF_SINE: u16 = 0x5a;
pub const FF_SAW_UP: u16 = 0x5b;
pub const FF_SAW_DOWN: u16 = 0x5c;

/// Pseudo-code: global gain (value 0..=0xFFFF)
pub const FF_GAIN: u16 = 0x60;

/// Pseudo-code: autocenter strength (value 0..=0xFFFF)
pub const FF_AUTOCENTER: u16 = 0x61;

pub const FF_MAX: u16 = 0x7f;

// ============================================================================
// Helper Functions
// ============================================================================

/// Check if code lies in the joystick/gamepad button block
#[inline]
pub const fn is_gamepad_button(code: u16) -> bool {
    code >= BTN_JOYSTICK && code < KEY_OK
}

/// Check if code is a valid absolute axis
#[inline]
pub const fn is_abs_axis(code: u16) -> bool {
    code <= ABS_MAX
}

/// Short name for an event type, for diagnostics
pub const fn event_type_name(ev_type: u16) -> &'static str {
    match ev_type {
        EV_SYN => "SYN",
        EV_KEY => "KEY",
        EV_REL => "REL",
        EV_ABS => "ABS",
        EV_MSC => "MSC",
        EV_SW => "SW",
        EV_LED => "LED",
        EV_SND => "SND",
        EV_REP => "REP",
        EV_FF => "FF",
        EV_PWR => "PWR",
        EV_FF_STATUS => "FF_STATUS",
        _ => "?",
    }
}

/// Short name for a bus type, for diagnostics
pub const fn bus_name(bus: u16) -> &'static str {
    match bus {
        BUS_PCI => "pci",
        BUS_USB => "usb",
        BUS_BLUETOOTH => "bluetooth",
        BUS_VIRTUAL => "virtual",
        BUS_I8042 => "i8042",
        BUS_HOST => "host",
        _ => "other",
    }
}
