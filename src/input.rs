//! Input device discovery & MT slot decoding (evdev 0.13.2 compatible).
//!
//! The kernel's multitouch type-B protocol reports per-slot tracking
//! ids and positions; `SlotDecoder` folds one SYN_REPORT's worth of
//! slot changes into the start/move/end contact batches the detector
//! consumes.

use std::time::Instant;

use evdev::{AbsoluteAxisCode, Device, EventType};

use crate::detector::{ContactBatch, ContactSample, Phase};
use crate::point::ContactId;

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
}

pub fn discover_multitouch() -> Vec<DeviceInfo> {
    let mut out = vec![];
    if let Ok(rd) = std::fs::read_dir("/dev/input") {
        for e in rd.flatten() {
            let p = e.path();
            if p.file_name()
                .and_then(|s| s.to_str())
                .map(|s| s.starts_with("event"))
                .unwrap_or(false)
            {
                if let Ok(dev) = Device::open(&p) {
                    let has_abs = dev.supported_events().contains(EventType::ABSOLUTE);
                    let axes = dev.supported_absolute_axes();
                    let has_mt = axes.map_or(false, |a| {
                        a.contains(AbsoluteAxisCode::ABS_MT_SLOT)
                            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_X)
                            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_Y)
                    });
                    if has_abs && has_mt {
                        out.push(DeviceInfo {
                            path: p.display().to_string(),
                            name: dev.name().unwrap_or("unknown").to_string(),
                        });
                    }
                }
            }
        }
    }
    out
}

#[derive(Debug, Clone)]
struct Slot {
    tracking_id: i32, // -1 = inactive
    x: f64,
    y: f64,
    started: bool,
    moved: bool,
    ended: Option<ContactId>,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            tracking_id: -1,
            x: 0.0,
            y: 0.0,
            started: false,
            moved: false,
            ended: None,
        }
    }
}

/// Accumulates per-slot axis events between SYN_REPORTs.
#[derive(Debug)]
pub struct SlotDecoder {
    slots: Vec<Slot>,
    cur_slot: usize,
    start_instant: Instant,
}

impl Default for SlotDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotDecoder {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::default(); 10],
            cur_slot: 0,
            start_instant: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.start_instant.elapsed().as_millis() as u64
    }

    pub fn on_slot(&mut self, slot: i32) {
        self.cur_slot = slot.clamp(0, self.slots.len() as i32 - 1) as usize;
    }

    pub fn on_tracking_id(&mut self, tracking_id: i32) {
        let s = &mut self.slots[self.cur_slot];
        if tracking_id < 0 {
            if s.tracking_id >= 0 {
                s.ended = Some(s.tracking_id);
            }
            s.tracking_id = -1;
            s.started = false;
            s.moved = false;
        } else {
            s.tracking_id = tracking_id;
            s.started = true;
        }
    }

    pub fn on_pos_x(&mut self, raw: i32) {
        let s = &mut self.slots[self.cur_slot];
        s.x = raw as f64;
        if !s.started {
            s.moved = true;
        }
    }

    pub fn on_pos_y(&mut self, raw: i32) {
        let s = &mut self.slots[self.cur_slot];
        s.y = raw as f64;
        if !s.started {
            s.moved = true;
        }
    }

    /// Flushes the slot changes accumulated since the last SYN_REPORT
    /// into at most one start, one move, and one end batch, in that
    /// order.
    pub fn on_syn_report(&mut self) -> Vec<ContactBatch> {
        let now = self.now_ms();
        let mut started = Vec::new();
        let mut moved = Vec::new();
        let mut ended = Vec::new();

        for s in &mut self.slots {
            if s.started && s.tracking_id >= 0 {
                started.push(ContactSample {
                    id: s.tracking_id,
                    x: s.x,
                    y: s.y,
                });
            } else if s.moved && s.tracking_id >= 0 {
                moved.push(ContactSample {
                    id: s.tracking_id,
                    x: s.x,
                    y: s.y,
                });
            }
            if let Some(id) = s.ended.take() {
                ended.push(ContactSample { id, x: s.x, y: s.y });
            }
            s.started = false;
            s.moved = false;
        }

        let mut batches = Vec::new();
        for (phase, contacts) in [
            (Phase::Start, started),
            (Phase::Move, moved),
            (Phase::End, ended),
        ] {
            if !contacts.is_empty() {
                batches.push(ContactBatch {
                    phase,
                    timestamp_ms: now,
                    contacts,
                });
            }
        }
        batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touchdown_emits_one_start_batch() {
        let mut d = SlotDecoder::new();
        d.on_slot(0);
        d.on_tracking_id(42);
        d.on_pos_x(512);
        d.on_pos_y(300);
        let batches = d.on_syn_report();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].phase, Phase::Start);
        assert_eq!(batches[0].contacts[0].id, 42);
        assert_eq!(batches[0].contacts[0].x, 512.0);
    }

    #[test]
    fn motion_after_touchdown_is_a_move_batch() {
        let mut d = SlotDecoder::new();
        d.on_slot(0);
        d.on_tracking_id(42);
        d.on_pos_x(512);
        d.on_pos_y(300);
        d.on_syn_report();
        d.on_pos_x(520);
        let batches = d.on_syn_report();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].phase, Phase::Move);
        assert_eq!(batches[0].contacts[0].x, 520.0);
        assert_eq!(batches[0].contacts[0].y, 300.0);
    }

    #[test]
    fn lift_reports_the_released_tracking_id() {
        let mut d = SlotDecoder::new();
        d.on_slot(0);
        d.on_tracking_id(42);
        d.on_pos_x(512);
        d.on_pos_y(300);
        d.on_syn_report();
        d.on_tracking_id(-1);
        let batches = d.on_syn_report();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].phase, Phase::End);
        assert_eq!(batches[0].contacts[0].id, 42);
    }

    #[test]
    fn simultaneous_slots_group_into_one_batch_per_phase() {
        let mut d = SlotDecoder::new();
        d.on_slot(0);
        d.on_tracking_id(1);
        d.on_pos_x(100);
        d.on_pos_y(100);
        d.on_slot(1);
        d.on_tracking_id(2);
        d.on_pos_x(200);
        d.on_pos_y(100);
        let batches = d.on_syn_report();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].contacts.len(), 2);

        d.on_slot(0);
        d.on_pos_x(110);
        d.on_slot(1);
        d.on_tracking_id(-1);
        let batches = d.on_syn_report();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].phase, Phase::Move);
        assert_eq!(batches[1].phase, Phase::End);
    }

    #[test]
    fn quiet_syn_report_emits_nothing() {
        let mut d = SlotDecoder::new();
        assert!(d.on_syn_report().is_empty());
    }
}
