//! Global constants for evhub
//!
//! Default paths and hotplug timing, used when the config file is absent.

// ============================================================================
// Discovery Paths
// ============================================================================

/// Directory holding the kernel's event nodes
pub const DEFAULT_INPUT_ROOT: &str = "/dev/input";

/// udev's stable by-path symlinks
pub const DEFAULT_BY_PATH_ROOT: &str = "/dev/input/by-path";

/// System-wide config file, read when no user config exists
pub const SYSTEM_CONFIG_PATH: &str = "/etc/evhub/config.toml";

// ============================================================================
// Hotplug Timing
// ============================================================================

/// Longest wait for the first notification of a batch
pub const HOTPLUG_WAIT_TIMEOUT_MS: u64 = 100;

/// Pause after the first notification so a burst lands in one batch
pub const HOTPLUG_SETTLE_DELAY_MS: u64 = 10;

/// Interval between open attempts on a freshly created node
pub const HOTPLUG_RETRY_INTERVAL_MS: u64 = 100;

/// Open attempts before giving up on a node (0 = never give up)
pub const HOTPLUG_RETRY_LIMIT: u32 = 50;
