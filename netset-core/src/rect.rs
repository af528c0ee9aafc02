//! Canonical unions of two-dimensional rectangles.
//!
//! A [`RectSet`] is stored as `(dim1, dim2)` pairs of [`IntervalSet`]s where
//! the `dim1` parts are pairwise disjoint and the `dim2` parts pairwise
//! distinct. Within those rules the representation is unique, which makes
//! equality a structural comparison.

use std::collections::BTreeMap;

use crate::interval::{Interval, IntervalSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RectSet {
    entries: Vec<(IntervalSet, IntervalSet)>,
}

impl RectSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The product `dim1 × dim2`.
    pub fn product(dim1: IntervalSet, dim2: IntervalSet) -> Self {
        if dim1.is_empty() || dim2.is_empty() {
            return Self::new();
        }
        Self {
            entries: vec![(dim1, dim2)],
        }
    }

    pub fn entries(&self) -> &[(IntervalSet, IntervalSet)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn union(&self, other: &Self) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        combine(self, other, |a, b| a.union(b))
    }

    pub fn intersect(&self, other: &Self) -> Self {
        if self.is_empty() || other.is_empty() {
            return Self::new();
        }
        combine(self, other, |a, b| a.intersect(b))
    }

    pub fn subtract(&self, other: &Self) -> Self {
        if self.is_empty() || other.is_empty() {
            return self.clone();
        }
        combine(self, other, |a, b| a.subtract(b))
    }

    pub fn is_subset(&self, other: &Self) -> bool {
        self.subtract(other).is_empty()
    }

    /// Exchange the two dimensions.
    pub fn transpose(&self) -> Self {
        canonicalize(
            self.entries
                .iter()
                .map(|(d1, d2)| (d2.clone(), d1.clone()))
                .collect(),
        )
    }
}

/// Elementary `dim1` segments induced by the boundaries of all entries.
fn boundaries<'a>(sets: impl Iterator<Item = &'a IntervalSet>) -> Vec<u64> {
    let mut points: Vec<u64> = sets
        .flat_map(|s| s.intervals().iter())
        .flat_map(|i| [u64::from(i.start), u64::from(i.end) + 1])
        .collect();
    points.sort_unstable();
    points.dedup();
    points
}

/// The `dim2` value of a canonical set at `point`; empty when uncovered.
fn value_at(set: &RectSet, point: u32) -> IntervalSet {
    set.entries
        .iter()
        .find(|(d1, _)| d1.contains(point))
        .map(|(_, d2)| d2.clone())
        .unwrap_or_default()
}

fn combine(
    a: &RectSet,
    b: &RectSet,
    op: impl Fn(&IntervalSet, &IntervalSet) -> IntervalSet,
) -> RectSet {
    let points = boundaries(
        a.entries
            .iter()
            .chain(b.entries.iter())
            .map(|(d1, _)| d1),
    );
    let mut segments = Vec::new();
    for window in points.windows(2) {
        let start = window[0] as u32;
        let value = op(&value_at(a, start), &value_at(b, start));
        if !value.is_empty() {
            segments.push((start, (window[1] - 1) as u32, value));
        }
    }
    group_segments(segments)
}

/// Build the canonical form from arbitrary (possibly overlapping) products.
fn canonicalize(rects: Vec<(IntervalSet, IntervalSet)>) -> RectSet {
    let points = boundaries(rects.iter().map(|(d1, _)| d1));
    let mut segments = Vec::new();
    for window in points.windows(2) {
        let start = window[0] as u32;
        let value = rects
            .iter()
            .filter(|(d1, _)| d1.contains(start))
            .fold(IntervalSet::new(), |acc, (_, d2)| acc.union(d2));
        if !value.is_empty() {
            segments.push((start, (window[1] - 1) as u32, value));
        }
    }
    group_segments(segments)
}

fn group_segments(segments: Vec<(u32, u32, IntervalSet)>) -> RectSet {
    let mut by_value: BTreeMap<IntervalSet, Vec<Interval>> = BTreeMap::new();
    for (start, end, value) in segments {
        by_value
            .entry(value)
            .or_default()
            .push(Interval { start, end });
    }
    let mut entries: Vec<(IntervalSet, IntervalSet)> = by_value
        .into_iter()
        .map(|(d2, d1)| (IntervalSet::from_intervals(d1), d2))
        .collect();
    entries.sort();
    RectSet { entries }
}
