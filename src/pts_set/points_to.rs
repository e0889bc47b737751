// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;
use std::slice;

use rustc_index::Idx;

use crate::util::bit_vec::{BitIter, BitVec};

const SMALL_SET_CAPACITY: usize = 32;

/// A set of abstract objects. Sets held by the solver only ever grow; `subtract`
/// is used on scratch copies to compute deltas.
pub trait PointsToSet<T> {
    type Iter<'a>: Iterator<Item = T>
    where
        Self: 'a;

    fn new() -> Self;
    fn count(&self) -> usize;
    fn contains(&self, elem: T) -> bool;
    fn is_empty(&self) -> bool;
    fn superset(&self, other: &Self) -> bool;
    fn insert(&mut self, elem: T) -> bool;
    fn union(&mut self, other: &Self) -> bool;
    fn subtract(&mut self, other: &Self) -> bool;
    fn iter<'a>(&'a self) -> Self::Iter<'a>;
}

/// Points-to set stored as a vector while small and as a bit vector once it
/// outgrows `SMALL_SET_CAPACITY`.
#[derive(Clone)]
pub struct HybridPointsToSet<T> {
    points_to: HybridSet<T>,
}

impl<T: Idx> fmt::Debug for HybridPointsToSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.points_to.fmt(f)
    }
}

impl<'a, T: Idx> IntoIterator for &'a HybridPointsToSet<T> {
    type Item = T;
    type IntoIter = HybridIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Idx> PointsToSet<T> for HybridPointsToSet<T> {
    fn new() -> Self {
        HybridPointsToSet {
            points_to: HybridSet::new(),
        }
    }

    fn count(&self) -> usize {
        self.points_to.count()
    }

    fn contains(&self, elem: T) -> bool {
        self.points_to.contains(elem)
    }

    fn is_empty(&self) -> bool {
        self.points_to.is_empty()
    }

    fn superset(&self, other: &HybridPointsToSet<T>) -> bool {
        self.points_to.superset(&other.points_to)
    }

    fn insert(&mut self, elem: T) -> bool {
        self.points_to.insert(elem)
    }

    fn union(&mut self, other: &HybridPointsToSet<T>) -> bool {
        self.points_to.union(&other.points_to)
    }

    fn subtract(&mut self, other: &HybridPointsToSet<T>) -> bool {
        self.points_to.subtract(&other.points_to)
    }

    type Iter<'a> = HybridIter<'a, T>;
    fn iter(&self) -> HybridIter<'_, T> {
        self.points_to.iter()
    }
}

#[derive(Clone)]
pub enum HybridSet<T> {
    SmallSet(Vec<T>),
    LargeSet(BitVec<T>),
}

impl<T: Idx> fmt::Debug for HybridSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SmallSet(s) => s.fmt(f),
            Self::LargeSet(s) => s.fmt(f),
        }
    }
}

impl<T: Idx> HybridSet<T> {
    pub fn new() -> Self {
        HybridSet::SmallSet(Vec::with_capacity(SMALL_SET_CAPACITY))
    }

    fn to_bit_vec(small: &[T]) -> BitVec<T> {
        let mut large = BitVec::new_empty();
        for &elem in small {
            large.insert(elem);
        }
        large
    }

    /// Switches to the bit vector representation, returning it.
    fn promote(&mut self) -> &mut BitVec<T> {
        if let HybridSet::SmallSet(small) = self {
            *self = HybridSet::LargeSet(Self::to_bit_vec(small));
        }
        match self {
            HybridSet::LargeSet(large) => large,
            HybridSet::SmallSet(_) => unreachable!(),
        }
    }

    pub fn count(&self) -> usize {
        match self {
            HybridSet::SmallSet(small) => small.len(),
            HybridSet::LargeSet(large) => large.count(),
        }
    }

    pub fn contains(&self, elem: T) -> bool {
        match self {
            HybridSet::SmallSet(small) => small.contains(&elem),
            HybridSet::LargeSet(large) => large.contains(elem),
        }
    }

    pub fn superset(&self, other: &HybridSet<T>) -> bool {
        if let (HybridSet::LargeSet(mine), HybridSet::LargeSet(theirs)) = (self, other) {
            return mine.superset(theirs);
        }
        other.iter().all(|elem| self.contains(elem))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            HybridSet::SmallSet(small) => small.is_empty(),
            HybridSet::LargeSet(large) => large.is_empty(),
        }
    }

    /// Returns true if `elem` was absent.
    pub fn insert(&mut self, elem: T) -> bool {
        match self {
            HybridSet::SmallSet(small) if small.contains(&elem) => false,
            HybridSet::SmallSet(small) if small.len() < SMALL_SET_CAPACITY => {
                small.push(elem);
                true
            }
            _ => self.promote().insert(elem),
        }
    }

    pub fn iter(&self) -> HybridIter<'_, T> {
        match self {
            HybridSet::SmallSet(small) => HybridIter::SmallIter(small.iter()),
            HybridSet::LargeSet(large) => HybridIter::LargeIter(large.iter()),
        }
    }

    pub fn union(&mut self, other: &HybridSet<T>) -> bool {
        match other {
            HybridSet::LargeSet(theirs) => self.promote().union(theirs),
            HybridSet::SmallSet(theirs) => theirs
                .iter()
                .fold(false, |changed, &elem| self.insert(elem) | changed),
        }
    }

    pub fn subtract(&mut self, other: &HybridSet<T>) -> bool {
        match (self, other) {
            (HybridSet::LargeSet(mine), HybridSet::LargeSet(theirs)) => mine.subtract(theirs),
            (HybridSet::LargeSet(mine), HybridSet::SmallSet(theirs)) => theirs
                .iter()
                .fold(false, |changed, &elem| mine.remove(elem) | changed),
            (HybridSet::SmallSet(mine), _) => {
                let before = mine.len();
                mine.retain(|&elem| !other.contains(elem));
                mine.len() != before
            }
        }
    }
}

pub enum HybridIter<'a, T: Idx> {
    SmallIter(slice::Iter<'a, T>),
    LargeIter(BitIter<'a, T>),
}

impl<'a, T: Idx> Iterator for HybridIter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        match self {
            HybridIter::SmallIter(small) => small.next().copied(),
            HybridIter::LargeIter(large) => large.next(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use rand::Rng;

    use crate::pts_set::points_to::{HybridPointsToSet, HybridSet, PointsToSet, SMALL_SET_CAPACITY};

    fn random_set(len: usize) -> HashSet<u32> {
        let mut rng = rand::thread_rng();
        let mut set = HashSet::new();
        while set.len() < len {
            let x = rng.gen_range(1..1000);
            set.insert(x);
        }
        set
    }

    fn to_pts(set: &HashSet<u32>) -> HybridPointsToSet<u32> {
        let mut pts = HybridPointsToSet::new();
        for x in set {
            pts.insert(*x);
        }
        pts
    }

    #[test]
    fn small_set_test() {
        let rand_set = random_set(8);
        let mut small_set = to_pts(&rand_set);
        assert_eq!(small_set.count(), 8);
        assert!(matches!(small_set.points_to, HybridSet::SmallSet(_)));
        assert_eq!(small_set.iter().collect::<HashSet<_>>(), rand_set);
        let any = *rand_set.iter().next().unwrap();
        assert!(small_set.contains(any));
        assert!(!small_set.insert(any));
        assert!(!small_set.contains(1000));
    }

    #[test]
    fn large_set_test() {
        let rand_set = random_set(SMALL_SET_CAPACITY + 3);
        let large_set = to_pts(&rand_set);
        assert_eq!(large_set.count(), SMALL_SET_CAPACITY + 3);
        assert!(matches!(large_set.points_to, HybridSet::LargeSet(_)));
        assert_eq!(large_set.iter().collect::<HashSet<_>>(), rand_set);
    }

    #[test]
    fn union_across_representations() {
        let rand_small_set = random_set(8);
        let rand_large_set = random_set(SMALL_SET_CAPACITY + 3);
        let small_set = to_pts(&rand_small_set);
        let large_set = to_pts(&rand_large_set);
        let expected = rand_small_set
            .union(&rand_large_set)
            .cloned()
            .collect::<HashSet<_>>();

        let mut union_set = small_set.clone();
        union_set.union(&large_set);
        assert!(union_set.superset(&small_set));
        assert!(union_set.superset(&large_set));
        assert_eq!(union_set.iter().collect::<HashSet<_>>(), expected);

        let mut union_set = large_set.clone();
        union_set.union(&small_set);
        assert_eq!(union_set.iter().collect::<HashSet<_>>(), expected);
        assert!(!union_set.union(&small_set));
    }

    #[test]
    fn subtract_test() {
        let rand_small_set = random_set(8);
        let mut rand_large_set = random_set(SMALL_SET_CAPACITY + 3);
        for &x in rand_small_set.iter().take(5) {
            rand_large_set.insert(x);
        }
        let small_set = to_pts(&rand_small_set);
        let large_set = to_pts(&rand_large_set);

        let mut cloned_set = small_set.clone();
        assert!(cloned_set.subtract(&large_set));
        assert_eq!(
            cloned_set.iter().collect::<HashSet<_>>(),
            rand_small_set.difference(&rand_large_set).cloned().collect::<HashSet<_>>()
        );

        cloned_set = large_set.clone();
        assert!(cloned_set.subtract(&small_set));
        assert_eq!(
            cloned_set.iter().collect::<HashSet<_>>(),
            rand_large_set.difference(&rand_small_set).cloned().collect::<HashSet<_>>()
        );
    }
}
