//! Trig helpers for the gesture engine. All angles are in degrees, all
//! distances in surface pixels. Nothing here holds state.

/// A position on the surface, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pos {
    pub x: f64,
    pub y: f64,
}

impl Pos {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Angle differences at or above this magnitude are treated as history
/// discontinuities (finger lift/re-touch) and excluded from rotation sums.
pub const ROTATION_ANOMALY_DEG: f64 = 150.0;

/// Unit-circle quadrant of `a` relative to reference `b`. Ties (either
/// axis equal) resolve to quadrant 4.
pub fn quadrant(a: Pos, b: Pos) -> u8 {
    if a.x < b.x && a.y > b.y {
        1
    } else if a.x > b.x && a.y > b.y {
        2
    } else if a.x > b.x && a.y < b.y {
        3
    } else {
        4
    }
}

/// Angle of a right triangle from its legs, corrected into the given
/// quadrant, in degrees.
pub fn theta(adjacent: f64, opposite: f64, quadrant: u8) -> f64 {
    let mut theta = (opposite / adjacent).atan();
    match quadrant {
        2 => theta = std::f64::consts::PI - theta,
        3 => theta += std::f64::consts::PI,
        4 => theta = 2.0 * std::f64::consts::PI - theta,
        _ => {}
    }
    theta.to_degrees()
}

/// Euclidean norm of two legs.
pub fn hypotenuse(adjacent: f64, opposite: f64) -> f64 {
    (adjacent * adjacent + opposite * opposite).sqrt()
}

/// Absolute separation of two scalar coordinates.
pub fn side(a: f64, b: f64) -> f64 {
    (a - b).abs()
}

/// Angle of the segment from `a` to `b`, measured against the axes with
/// `b` as the reference point.
pub fn angle_from(a: Pos, b: Pos) -> f64 {
    theta(side(a.x, b.x), side(a.y, b.y), quadrant(a, b))
}

/// Sums successive angle changes over two index-paired position
/// histories. Pairs past the shorter history are ignored, and any step
/// whose magnitude exceeds [`ROTATION_ANOMALY_DEG`] is dropped.
pub fn rotation_sum(history_a: &[Pos], history_b: &[Pos]) -> f64 {
    let angles: Vec<f64> = history_a
        .iter()
        .zip(history_b.iter())
        .map(|(&a, &b)| angle_from(a, b))
        .collect();

    let mut sum = 0.0;
    for pair in angles.windows(2) {
        let difference = pair[0] - pair[1];
        if difference.abs() < ROTATION_ANOMALY_DEG {
            sum += difference;
        }
    }
    sum
}

/// Opposite leg from hypotenuse and angle in degrees.
pub fn opposite_leg(hypotenuse: f64, theta_deg: f64) -> f64 {
    hypotenuse * theta_deg.to_radians().sin()
}

/// Adjacent leg from hypotenuse and angle in degrees.
pub fn adjacent_leg(hypotenuse: f64, theta_deg: f64) -> f64 {
    hypotenuse * theta_deg.to_radians().cos()
}

/// Folds a quadrant-corrected angle back into a first-quadrant reference
/// angle for leg projection.
pub fn adjusted_theta(theta_deg: f64, quadrant: u8) -> f64 {
    match quadrant {
        2 => 180.0 - theta_deg,
        3 => theta_deg - 180.0,
        4 => 360.0 - theta_deg,
        _ => theta_deg,
    }
}
