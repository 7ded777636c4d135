//! evhub - evdev input device monitor
//!
//! Runs an [`InputHub`] over the configured device classes and prints every
//! accepted event until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use log::info;
use nix::sys::signal::{SigSet, Signal};
use std::fs::File;

use evhub::config::Config;
use evhub::device::{Capability, DeviceEvent, DeviceInfo};
use evhub::event::codes;
use evhub::hub::enabled_classes;
use evhub::registry::list_candidates;
use evhub::{InputHub, Payload};

fn print_help() {
    println!(
        r#"evhub {} - evdev input device monitor

USAGE:
    evhub [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    -l, --list              Print identity and capabilities of every device, then exit
    --print-config          Print the effective configuration as TOML

ENVIRONMENT:
    EVHUB_CONFIG            Config file to use instead of the default
    RUST_LOG                Log filter (e.g. evhub=debug)

CONFIG FILE:
    ~/.config/evhub/config.toml
    /etc/evhub/config.toml
"#,
        env!("CARGO_PKG_VERSION")
    );
}

/// Print one device the way `--list` shows it
fn print_device(info: &DeviceInfo) {
    let id = &info.identity;
    println!("{}", info.path.display());
    println!("  name:     {}", id.name);
    println!(
        "  id:       bus {} ({:#06x}) vendor {:#06x} product {:#06x} version {:#06x}",
        codes::bus_name(id.bus_type),
        id.bus_type,
        id.vendor,
        id.product,
        id.version
    );
    if !id.phys.is_empty() {
        println!("  phys:     {}", id.phys);
    }
    if !id.uniq.is_empty() {
        println!("  uniq:     {}", id.uniq);
    }
    println!(
        "  driver:   {}.{}.{}",
        id.driver_version >> 16,
        (id.driver_version >> 8) & 0xff,
        id.driver_version & 0xff
    );
    if !id.properties.is_empty() {
        println!("  props:    {:?}", id.properties);
    }
    if id.num_effects > 0 {
        println!("  effects:  {}", id.num_effects);
    }
    for (ev_type, caps) in &info.capabilities {
        print!("  {:<9} ", format!("{}:", codes::event_type_name(*ev_type)));
        let mut first = true;
        for (code, cap) in caps {
            if !first {
                print!(", ");
            }
            first = false;
            match cap {
                Capability::Present => print!("{}", code),
                Capability::Axis(axis) => print!("{} [{}..{}]", code, axis.minimum, axis.maximum),
            }
        }
        println!();
    }
}

fn list_devices(config: &Config) {
    for class in enabled_classes(config) {
        println!("# {} ({})", class.name, class.root.display());
        for path in list_candidates(&class.root, |name| class.matches(name)) {
            match File::open(&path) {
                Ok(file) => print_device(&DeviceInfo::query(&path, &file)),
                Err(e) => println!("{}\n  unavailable: {}", path.display(), e),
            }
        }
    }
}

fn print_event(event: &DeviceEvent) {
    let time = event
        .record
        .timestamp()
        .map(|t| t.format("%H:%M:%S%.6f").to_string())
        .unwrap_or_default();
    let name = event.device.name();
    match event.payload {
        Payload::Typed { ev_type, code, value } => {
            if ev_type == codes::EV_SYN {
                return;
            }
            match event.normalized() {
                Some(norm) => println!(
                    "{} {} {} {} {} ({:+.3})",
                    time,
                    name,
                    codes::event_type_name(ev_type),
                    code,
                    value,
                    norm
                ),
                None => println!("{} {} {} {} {}", time, name, codes::event_type_name(ev_type), code, value),
            }
        }
        Payload::Code { code, value } => println!("{} {} {} {}", time, name, code, value),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Check command line arguments
    let args: Vec<String> = std::env::args().collect();

    // --help
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    // --version
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("evhub {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load();

    if args.iter().any(|a| a == "--print-config") {
        print!("{}", config.to_toml().context("Failed to render config")?);
        return Ok(());
    }

    if args.iter().any(|a| a == "--list" || a == "-l") {
        list_devices(&config);
        return Ok(());
    }

    info!("evhub starting...");

    // Block before any thread exists so every thread inherits the mask
    let mut signals = SigSet::empty();
    signals.add(Signal::SIGINT);
    signals.add(Signal::SIGTERM);
    signals.thread_block().context("Failed to block signals")?;

    let mut hub = InputHub::start(&config, print_event).context("Failed to start input hub")?;
    for device in hub.list_devices() {
        info!("Tracking {} ({})", device.path.display(), device.name());
    }

    let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]);

    let signal = signals.wait().context("Failed to wait for signal")?;
    info!("Received {:?}, shutting down", signal);

    let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Stopping]);
    hub.close_all();
    Ok(())
}
