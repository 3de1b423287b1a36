//! Interactive targets the gesture engine dispatches to. The engine
//! only sees the `Target` capability trait; `RectTarget` is the stock
//! implementation the pipeline and replay harness register.

use serde_json::json;

use crate::config::{SurfaceSpec, TargetSpec};
use crate::geometry;
use crate::point::ThrowVector;

/// Weak handle into a [`TargetRegistry`]. Points and clusters store
/// these instead of owning targets; targets outlive any contact.
pub type TargetId = usize;

/// Spin playback speed, matching a 1 degree step every 2 ms.
const SPIN_DEG_PER_MS: f64 = 0.5;

/// Gain applied to the exit velocity when projecting a throw slide.
const THROW_GAIN: f64 = 4.0;

/// Capability surface a target exposes to the gesture engine. Claim
/// methods return whether the claim succeeded, so a target can refuse a
/// gesture for its own reasons.
pub trait Target {
    fn is_inside(&self, x: f64, y: f64) -> bool;

    fn claim_for_drag(&mut self) -> bool {
        true
    }
    fn claim_for_zoom(&mut self) -> bool {
        true
    }
    fn claim_for_rotate(&mut self) -> bool {
        true
    }

    fn apply_zoom(&mut self, delta: f64);
    fn apply_rotation(&mut self, delta_deg: f64);
    /// Center-anchored reposition to the given surface position.
    fn reposition(&mut self, x: f64, y: f64);
    /// Hand over a flick vector; the target decides how to play it out.
    fn project_throw(&mut self, vector: &ThrowVector);
    /// Click effect: start the persistent spin animation, or cancel a
    /// running one.
    fn toggle_spin(&mut self);

    /// Timer-driven animation step, asynchronous relative to gesture
    /// dispatch.
    fn animate(&mut self, _now_ms: u64) {}

    fn describe(&self) -> serde_json::Value;
}

#[derive(Debug, Clone, Copy)]
struct Slide {
    x_step_per_ms: f64,
    y_step_per_ms: f64,
}

/// An axis-aligned rectangle on the surface that can be dragged,
/// zoomed, rotated, thrown, and spun.
#[derive(Debug)]
pub struct RectTarget {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
    min_size: f64,
    max_size: f64,
    surface_width: f64,
    surface_height: f64,
    spinning: bool,
    slide: Option<Slide>,
    last_tick_ms: Option<u64>,
}

impl RectTarget {
    pub fn new(x: f64, y: f64, width: f64, height: f64, surface: &SurfaceSpec) -> Self {
        Self {
            x,
            y,
            width,
            height,
            rotation: 0.0,
            min_size: 150.0,
            max_size: 500.0,
            surface_width: surface.width,
            surface_height: surface.height,
            spinning: false,
            slide: None,
            last_tick_ms: None,
        }
    }

    pub fn from_spec(spec: &TargetSpec, surface: &SurfaceSpec) -> Self {
        let mut t = Self::new(spec.x, spec.y, spec.width, spec.height, surface);
        t.min_size = spec.min_size;
        t.max_size = spec.max_size;
        t
    }

    pub fn is_spinning(&self) -> bool {
        self.spinning
    }

    pub fn is_sliding(&self) -> bool {
        self.slide.is_some()
    }
}

impl Target for RectTarget {
    fn is_inside(&self, x: f64, y: f64) -> bool {
        x > self.x && x < self.x + self.width && y > self.y && y < self.y + self.height
    }

    /// Resize by the delta and re-center by half of it; rejected when
    /// either dimension would leave the (min, max) band.
    fn apply_zoom(&mut self, delta: f64) {
        let new_width = self.width + delta;
        let new_height = self.height + delta;
        if new_width > self.min_size
            && new_width < self.max_size
            && new_height > self.min_size
            && new_height < self.max_size
        {
            self.width = new_width;
            self.height = new_height;
            self.x -= delta / 2.0;
            self.y -= delta / 2.0;
        }
    }

    fn apply_rotation(&mut self, delta_deg: f64) {
        self.rotation += delta_deg;
    }

    fn reposition(&mut self, x: f64, y: f64) {
        self.x = x - self.width / 2.0;
        self.y = y - self.height / 2.0;
    }

    /// Converts the flick into a constant-velocity slide along the
    /// throw direction; the animation tick carries it to the surface
    /// edge.
    fn project_throw(&mut self, vector: &ThrowVector) {
        if vector.duration_ms == 0 {
            return;
        }
        let speed = vector.distance / vector.duration_ms as f64;
        let dx = geometry::side(vector.start.x, vector.end.x);
        let dy = geometry::side(vector.start.y, vector.end.y);
        let quadrant = geometry::quadrant(vector.start, vector.end);
        let folded = geometry::adjusted_theta(geometry::theta(dx, dy, quadrant), quadrant);
        let mut x_step = geometry::adjacent_leg(speed * THROW_GAIN, folded);
        let mut y_step = geometry::opposite_leg(speed * THROW_GAIN, folded);
        if quadrant == 2 || quadrant == 3 {
            x_step = -x_step;
        }
        if quadrant == 1 || quadrant == 2 {
            y_step = -y_step;
        }
        self.slide = Some(Slide {
            x_step_per_ms: x_step,
            y_step_per_ms: y_step,
        });
    }

    fn toggle_spin(&mut self) {
        self.spinning = !self.spinning;
    }

    fn animate(&mut self, now_ms: u64) {
        let Some(last) = self.last_tick_ms.replace(now_ms) else {
            return;
        };
        let dt = now_ms.saturating_sub(last) as f64;
        if dt == 0.0 {
            return;
        }
        if self.spinning {
            self.rotation -= SPIN_DEG_PER_MS * dt;
        }
        if let Some(slide) = self.slide {
            self.x += slide.x_step_per_ms * dt;
            self.y += slide.y_step_per_ms * dt;
            let off_surface = self.x <= 0.0
                || self.x > self.surface_width - self.width
                || self.y <= 0.0
                || self.y > self.surface_height - self.height;
            if off_surface {
                self.slide = None;
            }
        }
    }

    fn describe(&self) -> serde_json::Value {
        json!({
            "x": self.x,
            "y": self.y,
            "width": self.width,
            "height": self.height,
            "rotation": self.rotation,
            "spinning": self.spinning,
            "sliding": self.slide.is_some(),
        })
    }
}

/// Owns every interactive target for the session. The engine refers to
/// targets only by index, so points and clusters never own them.
#[derive(Default)]
pub struct TargetRegistry {
    targets: Vec<Box<dyn Target>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, target: Box<dyn Target>) -> TargetId {
        self.targets.push(target);
        self.targets.len() - 1
    }

    pub fn get_mut(&mut self, id: TargetId) -> Option<&mut (dyn Target + 'static)> {
        self.targets.get_mut(id).map(|t| t.as_mut())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TargetId, &mut Box<dyn Target>)> {
        self.targets.iter_mut().enumerate()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn animate_all(&mut self, now_ms: u64) {
        for target in &mut self.targets {
            target.animate(now_ms);
        }
    }

    pub fn describe_all(&self) -> serde_json::Value {
        serde_json::Value::Array(self.targets.iter().map(|t| t.describe()).collect())
    }
}
