//! Per-batch gesture evaluation: rotation, then zoom, then drag, each
//! claiming points/clusters exclusively for the first target that
//! accepts, plus the click pass run on lift batches.

use log::debug;

use crate::cluster::ClusterState;
use crate::config::Thresholds;
use crate::detector::PointDetector;
use crate::geometry;
use crate::point::PointState;
use crate::target::TargetRegistry;

/// Minimum rotation-sum magnitude before a pair of contacts may enter
/// the rotating state.
const ROTATION_ENTRY_DEG: f64 = 2.0;

/// Runs the gesture passes for one move batch. Claim order matters:
/// rotation is offered before zoom, and both before drag, so a claimed
/// cluster/point is out of consideration for everything later.
pub fn evaluate_touch(det: &mut PointDetector, now_ms: u64, targets: &mut TargetRegistry) {
    if targets.is_empty() {
        return;
    }
    let th = det.thresholds().clone();
    if !det.clusters_of_size(2).is_empty() {
        rotation_pass(det, targets, &th);
        zoom_pass(det, targets);
    }
    drag_pass(det, now_ms, targets, &th);
}

/// Drains the click queue, toggling the spin animation on every target
/// that contains a click.
pub fn evaluate_clicks(det: &mut PointDetector, targets: &mut TargetRegistry) {
    for click in det.clicks.drain(..) {
        for (id, target) in targets.iter_mut() {
            if target.is_inside(click.pos.x, click.pos.y) {
                debug!("click at {:?} toggles spin on target {id}", click.pos);
                target.toggle_spin();
            }
        }
    }
}

fn rotation_pass(det: &mut PointDetector, targets: &mut TargetRegistry, th: &Thresholds) {
    let Some(bucket) = det.clusters.get_mut(&2) else {
        return;
    };
    for cluster in bucket.iter_mut() {
        if cluster.members.len() != 2 {
            continue;
        }
        match cluster.state {
            ClusterState::Zooming => {}
            ClusterState::Rotating => {
                if let (Some(delta), Some(id)) = (cluster.rotation_delta(&det.points), cluster.target)
                {
                    if let Some(target) = targets.get_mut(id) {
                        target.apply_rotation(delta);
                    }
                }
            }
            ClusterState::Neutral => {
                let Some(a) = det.points.get(&cluster.members[0]) else {
                    continue;
                };
                let Some(b) = det.points.get(&cluster.members[1]) else {
                    continue;
                };
                if !(a.is_unoccupied() && b.is_unoccupied()) {
                    continue;
                }
                let Some(weight) = cluster.nearest_edge_weight() else {
                    continue;
                };
                if weight >= th.rotation_separation_max {
                    continue;
                }
                let sum =
                    geometry::rotation_sum(&a.history_positions(), &b.history_positions());
                if sum.abs() <= ROTATION_ENTRY_DEG {
                    continue;
                }
                let (a_pos, b_pos) = (a.pos, b.pos);
                let claimed = targets.iter_mut().find_map(|(id, t)| {
                    (t.is_inside(a_pos.x, a_pos.y)
                        && t.is_inside(b_pos.x, b_pos.y)
                        && t.claim_for_rotate())
                    .then_some(id)
                });
                if let Some(id) = claimed {
                    debug!("cluster {} claimed for rotation by target {id}", cluster.id);
                    cluster.state = ClusterState::Rotating;
                    cluster.target = Some(id);
                    for member in cluster.members.clone() {
                        if let Some(p) = det.points.get_mut(&member) {
                            p.start_rotating(id);
                        }
                    }
                }
            }
        }
    }
}

fn zoom_pass(det: &mut PointDetector, targets: &mut TargetRegistry) {
    let Some(bucket) = det.clusters.get_mut(&2) else {
        return;
    };
    for cluster in bucket.iter_mut() {
        if cluster.members.len() != 2 {
            continue;
        }
        match cluster.state {
            ClusterState::Rotating => {}
            ClusterState::Zooming => {
                if let Some(id) = cluster.target {
                    if let Some(delta) = cluster.pinch_zoom_delta() {
                        if let Some(target) = targets.get_mut(id) {
                            target.apply_zoom(delta);
                        }
                    }
                }
            }
            ClusterState::Neutral => {
                let Some(a) = det.points.get(&cluster.members[0]) else {
                    continue;
                };
                let Some(b) = det.points.get(&cluster.members[1]) else {
                    continue;
                };
                if !(a.is_unoccupied() && b.is_unoccupied()) {
                    continue;
                }
                let (a_pos, b_pos) = (a.pos, b.pos);
                let claimed = targets.iter_mut().find_map(|(id, t)| {
                    (t.is_inside(a_pos.x, a_pos.y)
                        && t.is_inside(b_pos.x, b_pos.y)
                        && t.claim_for_zoom())
                    .then_some(id)
                });
                if let Some(id) = claimed {
                    debug!("cluster {} claimed for zoom by target {id}", cluster.id);
                    cluster.state = ClusterState::Zooming;
                    cluster.target = Some(id);
                    for member in cluster.members.clone() {
                        if let Some(p) = det.points.get_mut(&member) {
                            p.start_zooming(id);
                        }
                    }
                }
            }
        }
    }
}

fn drag_pass(det: &mut PointDetector, now_ms: u64, targets: &mut TargetRegistry, th: &Thresholds) {
    for point in det.points.values_mut() {
        if point.state == PointState::Zooming || !point.was_moved(th) {
            continue;
        }
        match point.state {
            PointState::Dragging => {
                if let Some(target) = point.target.and_then(|id| targets.get_mut(id)) {
                    target.reposition(point.pos.x, point.pos.y);
                }
            }
            PointState::Idle => {
                if point.age_ms(now_ms) <= th.min_drag_ms {
                    continue;
                }
                let pos = point.pos;
                let claimed = targets
                    .iter_mut()
                    .find_map(|(id, t)| (t.is_inside(pos.x, pos.y) && t.claim_for_drag()).then_some(id));
                if let Some(id) = claimed {
                    debug!("contact {} claimed for drag by target {id}", point.id);
                    point.start_dragging(id);
                }
            }
            _ => {}
        }
    }
}
