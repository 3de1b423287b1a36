//! Spatial clusters of co-located contacts: bounding-box history for
//! pinch detection and a greedy nearest-neighbor edge chain for
//! rotation eligibility.

use std::collections::HashMap;

use crate::geometry::{self, Pos};
use crate::point::{ContactId, HISTORY_CAP, TouchPoint};
use crate::target::TargetId;

/// Session-scoped cluster identifier; assigned from a monotonic counter
/// and never reused.
pub type ClusterId = u64;

/// A cluster needs at least this many members to exist.
pub const MIN_CLUSTER_SIZE: usize = 2;
/// Detection is skipped entirely above this many active contacts.
pub const MAX_CLUSTER_SIZE: usize = 16;

/// Pinch deltas need at least this many bounding-box samples.
const PINCH_MIN_SAMPLES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    fn around(positions: &[Pos]) -> Self {
        let mut bbox = Self {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for p in positions {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        bbox
    }

    pub fn width(&self) -> f64 {
        (self.max_x - self.min_x).abs()
    }

    pub fn height(&self) -> f64 {
        (self.max_y - self.min_y).abs()
    }

    pub fn center(&self) -> Pos {
        Pos::new(
            0.5 * (self.max_x + self.min_x),
            0.5 * (self.max_y + self.min_y),
        )
    }
}

/// One edge of the connectivity chain; weight is the floored pixel
/// distance between the two member contacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub nodes: (ContactId, ContactId),
    pub weight: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusterState {
    #[default]
    Neutral,
    Zooming,
    Rotating,
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: ClusterId,
    pub members: Vec<ContactId>,
    /// Member count at creation; clusters are stored keyed by this even
    /// if members lift later.
    pub size: usize,
    pub bbox: BoundingBox,
    /// Bounding-box extents, most recent first, capped at
    /// [`HISTORY_CAP`].
    pub width_history: Vec<f64>,
    pub height_history: Vec<f64>,
    pub edges: Vec<Edge>,
    pub state: ClusterState,
    /// Weak handle into the target registry once a gesture is claimed.
    pub target: Option<TargetId>,
}

impl Cluster {
    pub fn new(id: ClusterId, members: &[(ContactId, Pos)]) -> Self {
        let positions: Vec<Pos> = members.iter().map(|&(_, p)| p).collect();
        let bbox = BoundingBox::around(&positions);
        Self {
            id,
            members: members.iter().map(|&(id, _)| id).collect(),
            size: members.len(),
            bbox,
            width_history: vec![bbox.width()],
            height_history: vec![bbox.height()],
            edges: build_edges(members),
            state: ClusterState::default(),
            target: None,
        }
    }

    /// Refreshes bounding box, extent histories, and the edge chain from
    /// the members' current positions. Members that are no longer
    /// tracked are skipped.
    pub fn recompute(&mut self, points: &HashMap<ContactId, TouchPoint>) {
        let present: Vec<(ContactId, Pos)> = self
            .members
            .iter()
            .filter_map(|id| points.get(id).map(|p| (*id, p.pos)))
            .collect();
        let positions: Vec<Pos> = present.iter().map(|&(_, p)| p).collect();
        self.bbox = BoundingBox::around(&positions);
        self.width_history.insert(0, self.bbox.width());
        self.width_history.truncate(HISTORY_CAP);
        self.height_history.insert(0, self.bbox.height());
        self.height_history.truncate(HISTORY_CAP);
        self.edges = build_edges(&present);
    }

    /// Signed zoom delta from the oldest vs. newest bounding-box
    /// diagonal. Consuming the delta resets both histories to just the
    /// newest sample so deltas never compound.
    pub fn pinch_zoom_delta(&mut self) -> Option<f64> {
        if self.width_history.len() < PINCH_MIN_SAMPLES
            || self.height_history.len() < PINCH_MIN_SAMPLES
        {
            return None;
        }
        let newest_w = self.width_history[0];
        let newest_h = self.height_history[0];
        let oldest_w = *self.width_history.last().unwrap();
        let oldest_h = *self.height_history.last().unwrap();
        let delta = geometry::hypotenuse(oldest_w, oldest_h)
            - geometry::hypotenuse(newest_w, newest_h);
        self.width_history = vec![newest_w];
        self.height_history = vec![newest_h];
        Some(delta)
    }

    /// Per-frame rotation delta for a two-contact cluster, from the
    /// members' paired position histories.
    pub fn rotation_delta(&self, points: &HashMap<ContactId, TouchPoint>) -> Option<f64> {
        if self.members.len() != 2 {
            return None;
        }
        let a = points.get(&self.members[0])?;
        let b = points.get(&self.members[1])?;
        let sum = geometry::rotation_sum(&a.history_positions(), &b.history_positions());
        Some(-(sum / 2.0))
    }

    /// Weight of the chain edge built first (the leftmost contact's
    /// nearest neighbor); the rotation pass gates on it.
    pub fn nearest_edge_weight(&self) -> Option<u32> {
        self.edges.first().map(|e| e.weight)
    }
}

/// Greedy nearest-neighbor chain: sort by x, connect the leftmost
/// remaining contact to its nearest remaining neighbor, then swap that
/// neighbor to the front of the queue. Order-dependent and not a
/// minimum spanning tree; kept that way on purpose.
fn build_edges(members: &[(ContactId, Pos)]) -> Vec<Edge> {
    let mut queue: Vec<(ContactId, Pos)> = members.to_vec();
    queue.sort_by(|a, b| a.1.x.total_cmp(&b.1.x));

    let mut edges = Vec::new();
    while queue.len() > 1 {
        let (node_id, node_pos) = queue.remove(0);
        let mut nearest = 0;
        let mut nearest_dist = f64::INFINITY;
        for (i, &(_, pos)) in queue.iter().enumerate() {
            let dist = geometry::hypotenuse(
                geometry::side(node_pos.x, pos.x),
                geometry::side(node_pos.y, pos.y),
            );
            if dist < nearest_dist {
                nearest_dist = dist;
                nearest = i;
            }
        }
        edges.push(Edge {
            nodes: (node_id, queue[nearest].0),
            weight: nearest_dist as u32,
        });
        queue.swap(0, nearest);
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::TouchPoint;

    fn point_map(members: &[(ContactId, Pos)]) -> HashMap<ContactId, TouchPoint> {
        members
            .iter()
            .map(|&(id, pos)| (id, TouchPoint::new(id, pos, 0)))
            .collect()
    }

    #[test]
    fn bbox_and_extents_from_members() {
        let members = [
            (1, Pos::new(100.0, 100.0)),
            (2, Pos::new(150.0, 120.0)),
            (3, Pos::new(110.0, 180.0)),
        ];
        let c = Cluster::new(0, &members);
        assert_eq!(c.bbox.min_x, 100.0);
        assert_eq!(c.bbox.max_x, 150.0);
        assert_eq!(c.bbox.min_y, 100.0);
        assert_eq!(c.bbox.max_y, 180.0);
        assert_eq!(c.width_history, vec![50.0]);
        assert_eq!(c.height_history, vec![80.0]);
        assert_eq!(c.bbox.center(), Pos::new(125.0, 140.0));
    }

    #[test]
    fn edge_chain_connects_nearest_remaining() {
        // Leftmost is 1; nearest to 1 is 2; then 2 chains to 3.
        let members = [
            (1, Pos::new(0.0, 0.0)),
            (2, Pos::new(100.0, 0.0)),
            (3, Pos::new(130.0, 40.0)),
        ];
        let c = Cluster::new(0, &members);
        assert_eq!(c.edges.len(), 2);
        assert_eq!(c.edges[0].nodes, (1, 2));
        assert_eq!(c.edges[0].weight, 100);
        assert_eq!(c.edges[1].nodes, (2, 3));
        assert_eq!(c.edges[1].weight, 50);
        assert_eq!(c.nearest_edge_weight(), Some(100));
    }

    #[test]
    fn edge_weights_are_floored() {
        let members = [(1, Pos::new(0.0, 0.0)), (2, Pos::new(3.0, 4.5))];
        let c = Cluster::new(0, &members);
        // hypot(3, 4.5) = 5.408..., floored to 5.
        assert_eq!(c.edges[0].weight, 5);
    }

    #[test]
    fn recompute_is_idempotent_without_motion() {
        let members = [(1, Pos::new(10.0, 10.0)), (2, Pos::new(60.0, 50.0))];
        let mut c = Cluster::new(0, &members);
        let points = point_map(&members);
        c.recompute(&points);
        let (bbox, head_w, head_h, edges) = (
            c.bbox,
            c.width_history[0],
            c.height_history[0],
            c.edges.clone(),
        );
        c.recompute(&points);
        assert_eq!(c.bbox, bbox);
        assert_eq!(c.width_history[0], head_w);
        assert_eq!(c.height_history[0], head_h);
        assert_eq!(c.edges, edges);
    }

    #[test]
    fn extent_history_capped_newest_first() {
        let members = [(1, Pos::new(0.0, 0.0)), (2, Pos::new(10.0, 0.0))];
        let mut c = Cluster::new(0, &members);
        let mut points = point_map(&members);
        for i in 0..8u64 {
            points.get_mut(&2).unwrap().move_to(Pos::new(10.0 + i as f64, 0.0), i * 10);
            c.recompute(&points);
        }
        assert_eq!(c.width_history.len(), HISTORY_CAP);
        assert_eq!(c.width_history[0], 17.0);
    }

    #[test]
    fn pinch_delta_needs_enough_samples_then_resets() {
        let members = [(1, Pos::new(0.0, 0.0)), (2, Pos::new(30.0, 40.0))];
        let mut c = Cluster::new(0, &members);
        assert_eq!(c.pinch_zoom_delta(), None);

        let mut points = point_map(&members);
        // Spread the second contact outward along the same 3-4-5 ray.
        for i in 1..=3u64 {
            let p = points.get_mut(&2).unwrap();
            p.move_to(Pos::new(30.0 + 3.0 * i as f64, 40.0 + 4.0 * i as f64), i * 10);
            c.recompute(&points);
        }
        // Histories: widths [39, 36, 33, 30], heights [52, 48, 44, 40].
        let delta = c.pinch_zoom_delta().expect("four samples collected");
        // hypot(30, 40) - hypot(39, 52) = 50 - 65 = -15.
        assert_eq!(delta, -15.0);
        assert_eq!(c.width_history, vec![39.0]);
        assert_eq!(c.height_history, vec![52.0]);
    }

    #[test]
    fn rotation_delta_only_for_pairs() {
        let members = [
            (1, Pos::new(0.0, 0.0)),
            (2, Pos::new(10.0, 0.0)),
            (3, Pos::new(5.0, 5.0)),
        ];
        let c = Cluster::new(0, &members);
        assert_eq!(c.rotation_delta(&point_map(&members)), None);
    }

    #[test]
    fn rotation_delta_is_half_the_negated_sum() {
        let b_pos = Pos::new(0.0, 0.0);
        let at = |deg: f64| {
            let r = deg.to_radians();
            Pos::new(100.0 * r.cos(), 100.0 * r.sin())
        };
        let mut points = HashMap::new();
        let mut a = TouchPoint::new(1, at(5.0), 0);
        let b = {
            let mut b = TouchPoint::new(2, b_pos, 0);
            // Anchor finger stays put but still logs history.
            for i in 1..=4u64 {
                b.move_to(b_pos, i * 10);
            }
            b
        };
        for i in 1..=4u64 {
            a.move_to(at(5.0 + 10.0 * i as f64), i * 10);
        }
        points.insert(1, a);
        points.insert(2, b);
        let c = Cluster::new(0, &[(1, at(5.0)), (2, b_pos)]);
        let delta = c.rotation_delta(&points).unwrap();
        // Histories hold angles 145, 155, 165, 175 degrees (quadrant 2
        // mapping of 35..5), so the sum is -30 and the delta +15.
        assert!((delta - 15.0).abs() < 1e-6, "delta was {delta}");
    }
}
