// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use rustc_index::Idx;

use super::points_to::PointsToSet;

/// Diff points-to data.
/// The points-to set of a key is split into the part that has already been
/// propagated along its outgoing edges and the diff that is still pending.
/// Propagation is incremental: only the diff flows through the graph.
///
/// K  (Key):     the pointer owning a points-to set.
/// D  (Data):    elements in points-to sets.
/// DS (DataSet): the points-to set; a collection of Data.
pub struct DiffPTData<K, D, DS> {
    /// Diff points-to to be propagated.
    pub(crate) diff_pts_map: HashMap<K, DS>,
    /// Points-to already propagated.
    pub(crate) propa_pts_map: HashMap<K, DS>,

    marker: PhantomData<D>,
}

impl<K, D, DS> fmt::Debug for DiffPTData<K, D, DS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "DiffPTData".fmt(f)
    }
}

impl<K, D, DS> Default for DiffPTData<K, D, DS>
where
    K: Hash + Eq + Copy,
    D: Idx,
    DS: PointsToSet<D> + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, D, DS> DiffPTData<K, D, DS>
where
    K: Hash + Eq + Copy,
    D: Idx,
    DS: PointsToSet<D> + Clone,
{
    pub fn new() -> DiffPTData<K, D, DS> {
        DiffPTData {
            diff_pts_map: HashMap::new(),
            propa_pts_map: HashMap::new(),
            marker: PhantomData,
        }
    }

    /// Returns true if `elem` is in the points-to set of `var`.
    pub fn contains(&self, var: K, elem: D) -> bool {
        self.propa_pts_map.get(&var).is_some_and(|pts| pts.contains(elem))
            || self.diff_pts_map.get(&var).is_some_and(|pts| pts.contains(elem))
    }

    /// Adds element to the points-to set associated with var.
    /// Returns false if elem is already in this set
    #[inline]
    pub fn add_pts(&mut self, var: K, elem: D) -> bool {
        if let Some(propa) = self.propa_pts_map.get(&var) {
            if propa.contains(elem) {
                return false;
            }
        }
        let diff = self.diff_pts_map.entry(var).or_insert_with(DS::new);
        diff.insert(elem)
    }

    /// Unions `delta` into the points-to set of `var` and returns the subset of
    /// `delta` that was not already in it. The new subset becomes pending diff.
    pub fn propagate(&mut self, var: K, delta: &DS) -> DS {
        let mut new = delta.clone();
        if let Some(propa) = self.propa_pts_map.get(&var) {
            new.subtract(propa);
        }
        let diff = self.diff_pts_map.entry(var).or_insert_with(DS::new);
        new.subtract(diff);
        diff.union(&new);
        new
    }

    /// Moves the pending diff of `var` into its propagated part and returns it.
    pub fn flush(&mut self, var: K) -> Option<DS> {
        let diff = self.diff_pts_map.remove(&var)?;
        if diff.is_empty() {
            return None;
        }
        let propa = self.propa_pts_map.entry(var).or_insert_with(DS::new);
        propa.union(&diff);
        Some(diff)
    }

    /// Get diff points to.
    #[inline]
    pub fn get_diff_pts(&self, var: K) -> Option<&DS> {
        self.diff_pts_map.get(&var)
    }

    /// Get propagated points to.
    #[inline]
    pub fn get_propa_pts(&self, var: K) -> Option<&DS> {
        self.propa_pts_map.get(&var)
    }

    /// The whole points-to set of `var`, propagated and pending.
    pub fn get_pts(&self, var: K) -> DS {
        let mut pts = self.propa_pts_map.get(&var).cloned().unwrap_or_else(DS::new);
        if let Some(diff) = self.diff_pts_map.get(&var) {
            pts.union(diff);
        }
        pts
    }

    /// Keys with a non-empty points-to set.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.propa_pts_map
            .iter()
            .chain(self.diff_pts_map.iter().filter(|(k, _)| !self.propa_pts_map.contains_key(k)))
            .filter(|(_, pts)| !pts.is_empty())
            .map(|(k, _)| *k)
    }

    /// Returns true if no diff is pending for any key.
    pub fn is_quiescent(&self) -> bool {
        self.diff_pts_map.values().all(|pts| pts.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pts_set::points_to::HybridPointsToSet;

    type PTData = DiffPTData<u32, u32, HybridPointsToSet<u32>>;

    fn set(elems: &[u32]) -> HybridPointsToSet<u32> {
        let mut pts = HybridPointsToSet::new();
        for e in elems {
            pts.insert(*e);
        }
        pts
    }

    #[test]
    fn propagate_returns_only_new_elements() {
        let mut pt_data = PTData::new();
        let new = pt_data.propagate(0, &set(&[1, 2]));
        assert_eq!(new.count(), 2);
        assert_eq!(pt_data.flush(0).map(|d| d.count()), Some(2));
        assert!(pt_data.is_quiescent());

        let new = pt_data.propagate(0, &set(&[2, 3]));
        assert_eq!(new.iter().collect::<Vec<_>>(), vec![3]);
        // already pending
        assert!(pt_data.propagate(0, &set(&[3])).is_empty());
        assert!(!pt_data.is_quiescent());
        assert_eq!(pt_data.get_pts(0).count(), 3);
        assert!(pt_data.contains(0, 3));
        assert!(!pt_data.contains(1, 3));
    }

    #[test]
    fn flush_moves_diff_to_propagated() {
        let mut pt_data = PTData::new();
        assert!(pt_data.add_pts(4, 7));
        assert!(!pt_data.add_pts(4, 7));
        assert_eq!(pt_data.get_propa_pts(4).map(|p| p.count()), None);
        assert!(pt_data.flush(4).is_some());
        assert!(pt_data.flush(4).is_none());
        assert!(!pt_data.add_pts(4, 7));
        assert_eq!(pt_data.get_propa_pts(4).map(|p| p.count()), Some(1));
        assert_eq!(pt_data.keys().collect::<Vec<_>>(), vec![4]);
    }
}
