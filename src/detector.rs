//! Detector façade: owns the touch list, the size-keyed cluster map,
//! and the click queue, and dispatches one contact-change batch at a
//! time through the tracking/clustering lifecycle.

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::cluster::{Cluster, ClusterId, MAX_CLUSTER_SIZE, MIN_CLUSTER_SIZE};
use crate::config::Thresholds;
use crate::geometry::{self, Pos};
use crate::point::{ContactId, PointState, TouchPoint};
use crate::target::TargetRegistry;

/// Which part of the contact lifecycle a batch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Start,
    Move,
    End,
}

/// One contact that changed in a batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContactSample {
    pub id: ContactId,
    pub x: f64,
    pub y: f64,
}

/// All contacts that changed in one native input event, processed
/// atomically with respect to gesture evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactBatch {
    pub phase: Phase,
    #[serde(rename = "t")]
    pub timestamp_ms: u64,
    pub contacts: Vec<ContactSample>,
}

/// A completed short tap, consumed once by the click-evaluation pass.
#[derive(Debug, Clone, Copy)]
pub struct Click {
    pub pos: Pos,
    pub at_ms: u64,
}

/// Tracks contacts and clusters across the touch-event lifecycle.
#[derive(Debug)]
pub struct PointDetector {
    pub(crate) points: HashMap<ContactId, TouchPoint>,
    /// Clusters keyed by creation size. Detection over-generates
    /// overlapping clusters on purpose; consumers tolerate duplicates.
    pub(crate) clusters: BTreeMap<usize, Vec<Cluster>>,
    pub(crate) clicks: Vec<Click>,
    next_cluster_id: ClusterId,
    th: Thresholds,
}

impl PointDetector {
    pub fn new(th: Thresholds) -> Self {
        Self {
            points: HashMap::new(),
            clusters: BTreeMap::new(),
            clicks: Vec::new(),
            next_cluster_id: 0,
            th,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.th
    }

    pub fn active_count(&self) -> usize {
        self.points.len()
    }

    pub fn point(&self, id: ContactId) -> Option<&TouchPoint> {
        self.points.get(&id)
    }

    pub fn clusters_of_size(&self, size: usize) -> &[Cluster] {
        self.clusters.get(&size).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn pending_clicks(&self) -> &[Click] {
        &self.clicks
    }

    /// Dispatches one batch. Throw projection on lift needs the target
    /// registry; start/move batches leave it untouched.
    pub fn update(&mut self, batch: &ContactBatch, targets: &mut TargetRegistry) {
        match batch.phase {
            Phase::Start => {
                self.add_points(batch);
                self.detect_clusters(batch);
            }
            Phase::Move => {
                self.move_points(batch);
                self.recompute_clusters();
            }
            Phase::End => {
                self.remove_points(batch, targets);
            }
        }
    }

    fn add_points(&mut self, batch: &ContactBatch) {
        for c in &batch.contacts {
            if self.points.contains_key(&c.id) {
                warn!("contact {} reported as started twice; ignoring", c.id);
                continue;
            }
            self.points.insert(
                c.id,
                TouchPoint::new(c.id, Pos::new(c.x, c.y), batch.timestamp_ms),
            );
        }
    }

    fn move_points(&mut self, batch: &ContactBatch) {
        for c in &batch.contacts {
            match self.points.get_mut(&c.id) {
                Some(p) => p.move_to(Pos::new(c.x, c.y), batch.timestamp_ms),
                None => warn!("move for untracked contact {}; ignoring", c.id),
            }
        }
    }

    /// Seeds a proximity scan from each newly started contact. Every
    /// time a seed's accumulating group grows past one member the group
    /// is materialized as a cluster, so one seed with k neighbors
    /// yields clusters of size 2..=k. Candidates outside the size
    /// bounds are discarded.
    fn detect_clusters(&mut self, batch: &ContactBatch) {
        let active = self.points.len();
        if !(MIN_CLUSTER_SIZE..=MAX_CLUSTER_SIZE).contains(&active) {
            return;
        }

        let mut seeds: Vec<Pos> = batch
            .contacts
            .iter()
            .filter_map(|c| self.points.get(&c.id).map(|p| p.pos))
            .collect();
        seeds.sort_by(|a, b| a.x.total_cmp(&b.x));

        // Scan in ascending contact-id order so repeated detection over
        // the same contacts is deterministic.
        let mut scan: Vec<(ContactId, Pos)> =
            self.points.values().map(|p| (p.id, p.pos)).collect();
        scan.sort_by_key(|&(id, _)| id);

        let mut found = Vec::new();
        for seed in seeds {
            let mut group: Vec<(ContactId, Pos)> = Vec::new();
            for &(id, pos) in &scan {
                let dist =
                    geometry::hypotenuse(geometry::side(seed.x, pos.x), geometry::side(seed.y, pos.y));
                if dist < self.th.cluster_radius {
                    group.push((id, pos));
                    if (MIN_CLUSTER_SIZE..=MAX_CLUSTER_SIZE).contains(&group.len()) {
                        let id = self.next_cluster_id;
                        self.next_cluster_id += 1;
                        found.push(Cluster::new(id, &group));
                    }
                }
            }
        }

        for cluster in found {
            debug!(
                "cluster {} formed: {} members {:?}",
                cluster.id, cluster.size, cluster.members
            );
            for member in &cluster.members {
                if let Some(p) = self.points.get_mut(member) {
                    p.membership.push(cluster.id);
                }
            }
            self.clusters.entry(cluster.size).or_default().push(cluster);
        }
    }

    fn recompute_clusters(&mut self) {
        for bucket in self.clusters.values_mut() {
            for cluster in bucket.iter_mut() {
                cluster.recompute(&self.points);
            }
        }
    }

    /// Lift handling: short idle contacts queue a click, fast dragged
    /// contacts hand their throw vector to the claimed target, and the
    /// contact is detached from every cluster either way.
    fn remove_points(&mut self, batch: &ContactBatch, targets: &mut TargetRegistry) {
        for c in &batch.contacts {
            let Some(point) = self.points.remove(&c.id) else {
                warn!("lift for untracked contact {}; ignoring", c.id);
                continue;
            };

            if point.state == PointState::Idle
                && point.age_ms(batch.timestamp_ms) < self.th.click_max_ms
            {
                debug!("contact {} was a click at {:?}", point.id, point.pos);
                self.clicks.push(Click {
                    pos: point.pos,
                    at_ms: batch.timestamp_ms,
                });
            } else if point.state == PointState::Dragging {
                if let Some(vector) = point.was_thrown(&self.th) {
                    if let Some(target) = point.target.and_then(|id| targets.get_mut(id)) {
                        debug!(
                            "contact {} thrown: {:.1} px in {} ms",
                            point.id, vector.distance, vector.duration_ms
                        );
                        target.project_throw(&vector);
                    }
                }
            }

            self.detach(&point);
        }
    }

    /// Strips the lifted contact from every cluster it belonged to and
    /// tears down clusters left below the minimum size, repairing the
    /// remaining members' membership sets.
    fn detach(&mut self, point: &TouchPoint) {
        let mut orphaned: Vec<(ClusterId, Vec<ContactId>)> = Vec::new();
        for &cluster_id in &point.membership {
            for bucket in self.clusters.values_mut() {
                let Some(i) = bucket.iter().position(|c| c.id == cluster_id) else {
                    continue;
                };
                bucket[i].members.retain(|&m| m != point.id);
                if bucket[i].members.len() < MIN_CLUSTER_SIZE {
                    let dead = bucket.remove(i);
                    debug!("cluster {} torn down after contact {} lift", dead.id, point.id);
                    orphaned.push((dead.id, dead.members));
                }
                break;
            }
        }
        self.clusters.retain(|_, bucket| !bucket.is_empty());
        for (cluster_id, members) in orphaned {
            for member in members {
                if let Some(p) = self.points.get_mut(&member) {
                    p.membership.retain(|&id| id != cluster_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(phase: Phase, t: u64, contacts: &[(ContactId, f64, f64)]) -> ContactBatch {
        ContactBatch {
            phase,
            timestamp_ms: t,
            contacts: contacts
                .iter()
                .map(|&(id, x, y)| ContactSample { id, x, y })
                .collect(),
        }
    }

    fn detector() -> (PointDetector, TargetRegistry) {
        (PointDetector::new(Thresholds::default()), TargetRegistry::new())
    }

    /// Membership symmetry: every cluster member lists the cluster and
    /// every listed cluster contains the member.
    fn assert_membership_symmetry(det: &PointDetector) {
        for bucket in det.clusters.values() {
            for cluster in bucket {
                for member in &cluster.members {
                    let p = det.points.get(member).expect("member tracked");
                    assert!(
                        p.membership.contains(&cluster.id),
                        "contact {member} missing membership of cluster {}",
                        cluster.id
                    );
                }
            }
        }
        for p in det.points.values() {
            for cluster_id in &p.membership {
                let listed = det
                    .clusters
                    .values()
                    .flatten()
                    .any(|c| c.id == *cluster_id && c.members.contains(&p.id));
                assert!(listed, "cluster {cluster_id} does not list contact {}", p.id);
            }
        }
    }

    #[test]
    fn duplicate_start_is_ignored() {
        let (mut det, mut targets) = detector();
        det.update(&batch(Phase::Start, 0, &[(1, 10.0, 10.0)]), &mut targets);
        det.update(&batch(Phase::Start, 5, &[(1, 99.0, 99.0)]), &mut targets);
        assert_eq!(det.active_count(), 1);
        assert_eq!(det.point(1).unwrap().pos, Pos::new(10.0, 10.0));
    }

    #[test]
    fn move_and_end_for_unknown_contact_are_noops() {
        let (mut det, mut targets) = detector();
        det.update(&batch(Phase::Move, 0, &[(7, 1.0, 1.0)]), &mut targets);
        det.update(&batch(Phase::End, 0, &[(7, 1.0, 1.0)]), &mut targets);
        assert_eq!(det.active_count(), 0);
        assert!(det.pending_clicks().is_empty());
    }

    #[test]
    fn nearby_starts_form_a_single_pair_cluster() {
        let (mut det, mut targets) = detector();
        det.update(&batch(Phase::Start, 0, &[(1, 100.0, 100.0)]), &mut targets);
        det.update(&batch(Phase::Start, 10, &[(2, 150.0, 120.0)]), &mut targets);
        let pairs = det.clusters_of_size(2);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].members, vec![1, 2]);
        assert_membership_symmetry(&det);
    }

    #[test]
    fn distant_contact_stays_out_of_the_cluster() {
        let (mut det, mut targets) = detector();
        det.update(&batch(Phase::Start, 0, &[(1, 100.0, 100.0)]), &mut targets);
        det.update(&batch(Phase::Start, 10, &[(2, 150.0, 120.0)]), &mut targets);
        det.update(&batch(Phase::Start, 20, &[(3, 5000.0, 5000.0)]), &mut targets);
        let pairs = det.clusters_of_size(2);
        assert_eq!(pairs.len(), 1);
        assert!(!pairs[0].members.contains(&3));
        assert!(det.clusters_of_size(3).is_empty());
        assert_membership_symmetry(&det);
    }

    #[test]
    fn one_seed_with_two_neighbors_over_generates() {
        let (mut det, mut targets) = detector();
        det.update(&batch(Phase::Start, 0, &[(1, 100.0, 100.0)]), &mut targets);
        det.update(&batch(Phase::Start, 5, &[(2, 200.0, 100.0)]), &mut targets);
        // Third contact lands near both; its seed scan accumulates all
        // three, materializing a pair and a triple.
        det.update(&batch(Phase::Start, 10, &[(3, 150.0, 150.0)]), &mut targets);
        assert_eq!(det.clusters_of_size(2).len(), 2);
        assert_eq!(det.clusters_of_size(3).len(), 1);
        assert_membership_symmetry(&det);
    }

    #[test]
    fn cluster_ids_are_monotonic_and_never_reused() {
        let (mut det, mut targets) = detector();
        det.update(&batch(Phase::Start, 0, &[(1, 0.0, 0.0)]), &mut targets);
        det.update(&batch(Phase::Start, 5, &[(2, 50.0, 0.0)]), &mut targets);
        let first = det.clusters_of_size(2)[0].id;
        det.update(&batch(Phase::End, 10, &[(2, 50.0, 0.0)]), &mut targets);
        det.update(&batch(Phase::Start, 400, &[(2, 50.0, 0.0)]), &mut targets);
        let second = det.clusters_of_size(2)[0].id;
        assert!(second > first);
    }

    #[test]
    fn short_idle_lift_queues_exactly_one_click() {
        let (mut det, mut targets) = detector();
        det.update(&batch(Phase::Start, 0, &[(1, 100.0, 100.0)]), &mut targets);
        det.update(&batch(Phase::Move, 80, &[(1, 102.0, 101.0)]), &mut targets);
        det.update(&batch(Phase::End, 150, &[(1, 102.0, 101.0)]), &mut targets);
        assert_eq!(det.pending_clicks().len(), 1);
        assert_eq!(det.pending_clicks()[0].pos, Pos::new(102.0, 101.0));
        assert_eq!(det.active_count(), 0);
    }

    #[test]
    fn slow_lift_is_not_a_click() {
        let (mut det, mut targets) = detector();
        det.update(&batch(Phase::Start, 0, &[(1, 100.0, 100.0)]), &mut targets);
        det.update(&batch(Phase::End, 250, &[(1, 100.0, 100.0)]), &mut targets);
        assert!(det.pending_clicks().is_empty());
    }

    #[test]
    fn lift_tears_down_pair_clusters_and_repairs_membership() {
        let (mut det, mut targets) = detector();
        det.update(&batch(Phase::Start, 0, &[(1, 100.0, 100.0)]), &mut targets);
        det.update(&batch(Phase::Start, 10, &[(2, 150.0, 120.0)]), &mut targets);
        assert_eq!(det.clusters_of_size(2).len(), 1);
        det.update(&batch(Phase::End, 300, &[(2, 150.0, 120.0)]), &mut targets);
        assert!(det.clusters_of_size(2).is_empty());
        assert!(det.point(1).unwrap().membership.is_empty());
        assert_membership_symmetry(&det);
    }

    #[test]
    fn moves_recompute_cluster_extents() {
        let (mut det, mut targets) = detector();
        det.update(&batch(Phase::Start, 0, &[(1, 100.0, 100.0)]), &mut targets);
        det.update(&batch(Phase::Start, 10, &[(2, 150.0, 100.0)]), &mut targets);
        det.update(&batch(Phase::Move, 20, &[(2, 180.0, 100.0)]), &mut targets);
        let c = &det.clusters_of_size(2)[0];
        assert_eq!(c.bbox.width(), 80.0);
        assert_eq!(c.width_history[0], 80.0);
        assert_eq!(c.width_history.len(), 2);
    }

    #[test]
    fn seventeenth_contact_suppresses_detection() {
        let (mut det, mut targets) = detector();
        for i in 0..17 {
            det.update(
                &batch(Phase::Start, i as u64, &[(i, 100.0 + i as f64, 100.0)]),
                &mut targets,
            );
        }
        // The 17th start found 17 active contacts, over the bound.
        let total: usize = (2..=16).map(|s| det.clusters_of_size(s).len()).sum();
        let after_16: usize = (2..=16)
            .map(|s| {
                det.clusters_of_size(s)
                    .iter()
                    .filter(|c| c.members.contains(&16))
                    .count()
            })
            .sum();
        assert!(total > 0);
        assert_eq!(after_16, 0);
        assert_membership_symmetry(&det);
    }
}
