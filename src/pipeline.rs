//! Live run loop: evdev events in, gesture side effects out.

use anyhow::{Result, anyhow};
use log::{info, warn};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

use evdev::{AbsoluteAxisCode, Device, EventType, SynchronizationCode};

use crate::config::ConfigState;
use crate::detector::{Phase, PointDetector};
use crate::evaluate;
use crate::input::{self, SlotDecoder};
use crate::target::{RectTarget, TargetRegistry};

/// Opens every multitouch device (or just `device_override`) and runs
/// the gesture engine until SIGINT/SIGTERM.
pub fn run(device_override: Option<String>) -> Result<()> {
    let state = ConfigState::load_or_install_default()?;
    info!("active profile '{}'", state.active_name);

    let mut targets = TargetRegistry::new();
    for spec in &state.profile.targets {
        targets.register(Box::new(RectTarget::from_spec(spec, &state.profile.surface)));
    }
    if targets.is_empty() {
        warn!("profile registers no targets; gestures will be tracked but go nowhere");
    }

    let devices = match device_override {
        Some(path) => vec![path],
        None => input::discover_multitouch()
            .into_iter()
            .map(|d| d.path)
            .collect(),
    };
    if devices.is_empty() {
        return Err(anyhow!("no multitouch devices detected (try `tablectl doctor`)"));
    }

    let mut devs: Vec<Device> = vec![];
    for path in devices {
        match Device::open(&path) {
            Ok(mut dev) => {
                let _ = dev.set_nonblocking(true);
                info!("opened {} ({})", path, dev.name().unwrap_or("unknown"));
                devs.push(dev);
            }
            Err(e) => warn!("failed to open {path}: {e}"),
        }
    }
    if devs.is_empty() {
        return Err(anyhow!("failed to open all detected devices"));
    }

    let term = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&term))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&term))?;

    let mut decoder = SlotDecoder::new();
    let mut detector = PointDetector::new(state.profile.thresholds.clone());

    while !term.load(Ordering::Relaxed) {
        let mut any_event = false;

        for dev in devs.iter_mut() {
            if let Ok(events) = dev.fetch_events() {
                for ev in events {
                    any_event = true;

                    if ev.event_type() == EventType::ABSOLUTE {
                        match ev.code() {
                            c if c == AbsoluteAxisCode::ABS_MT_SLOT.0 => {
                                decoder.on_slot(ev.value());
                            }
                            c if c == AbsoluteAxisCode::ABS_MT_TRACKING_ID.0 => {
                                decoder.on_tracking_id(ev.value());
                            }
                            c if c == AbsoluteAxisCode::ABS_MT_POSITION_X.0 => {
                                decoder.on_pos_x(ev.value());
                            }
                            c if c == AbsoluteAxisCode::ABS_MT_POSITION_Y.0 => {
                                decoder.on_pos_y(ev.value());
                            }
                            _ => {}
                        }
                    } else if ev.event_type() == EventType::SYNCHRONIZATION
                        && ev.code() == SynchronizationCode::SYN_REPORT.0
                    {
                        for batch in decoder.on_syn_report() {
                            detector.update(&batch, &mut targets);
                            match batch.phase {
                                Phase::Move => evaluate::evaluate_touch(
                                    &mut detector,
                                    batch.timestamp_ms,
                                    &mut targets,
                                ),
                                Phase::End => {
                                    evaluate::evaluate_clicks(&mut detector, &mut targets)
                                }
                                Phase::Start => {}
                            }
                        }
                    }
                }
            }
        }

        // Spin/slide playback runs off the same clock but independently
        // of gesture dispatch.
        targets.animate_all(decoder.now_ms());

        if !any_event {
            thread::sleep(Duration::from_millis(4));
        }
    }

    info!("shutting down");
    Ok(())
}
