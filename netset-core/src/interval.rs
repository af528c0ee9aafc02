use std::fmt::{self, Display, Formatter};

/// An inclusive range of `u32` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval {
    pub start: u32,
    pub end: u32,
}

impl Interval {
    /// Create an interval; returns `None` when `start > end`.
    pub fn new(start: u32, end: u32) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn contains(&self, value: u32) -> bool {
        self.start <= value && value <= self.end
    }

    /// Number of values in the interval.
    pub fn size(&self) -> u64 {
        u64::from(self.end) - u64::from(self.start) + 1
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// A canonical union of inclusive `u32` intervals.
///
/// Intervals are kept sorted, non-overlapping and non-adjacent, so two sets
/// holding the same values are structurally equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    /// The empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding the single range `start..=end` (empty if inverted).
    pub fn from_range(start: u32, end: u32) -> Self {
        match Interval::new(start, end) {
            Some(interval) => Self {
                intervals: vec![interval],
            },
            None => Self::new(),
        }
    }

    /// Build a canonical set from arbitrary, possibly overlapping intervals.
    pub fn from_intervals(intervals: impl IntoIterator<Item = Interval>) -> Self {
        let mut raw: Vec<Interval> = intervals.into_iter().collect();
        raw.sort();
        let mut merged: Vec<Interval> = Vec::with_capacity(raw.len());
        for interval in raw {
            match merged.last_mut() {
                Some(last) if u64::from(last.end) + 1 >= u64::from(interval.start) => {
                    last.end = last.end.max(interval.end);
                }
                _ => merged.push(interval),
            }
        }
        Self { intervals: merged }
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn contains(&self, value: u32) -> bool {
        let idx = self.intervals.partition_point(|i| i.end < value);
        self.intervals
            .get(idx)
            .is_some_and(|interval| interval.contains(value))
    }

    /// Smallest value in the set.
    pub fn first(&self) -> Option<u32> {
        self.intervals.first().map(|i| i.start)
    }

    /// Largest value in the set.
    pub fn last(&self) -> Option<u32> {
        self.intervals.last().map(|i| i.end)
    }

    /// Total number of values.
    pub fn size(&self) -> u64 {
        self.intervals.iter().map(Interval::size).sum()
    }

    pub fn union(&self, other: &Self) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        Self::from_intervals(
            self.intervals
                .iter()
                .chain(other.intervals.iter())
                .copied(),
        )
    }

    pub fn intersect(&self, other: &Self) -> Self {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.intervals.len() && j < other.intervals.len() {
            let a = self.intervals[i];
            let b = other.intervals[j];
            let start = a.start.max(b.start);
            let end = a.end.min(b.end);
            if start <= end {
                out.push(Interval { start, end });
            }
            if a.end < b.end {
                i += 1;
            } else {
                j += 1;
            }
        }
        // Pieces of disjoint sorted inputs are already canonical.
        Self { intervals: out }
    }

    pub fn subtract(&self, other: &Self) -> Self {
        if other.is_empty() || self.is_empty() {
            return self.clone();
        }
        let mut out = Vec::new();
        let mut j = 0;
        for interval in &self.intervals {
            let mut start = u64::from(interval.start);
            let end = u64::from(interval.end);
            while j < other.intervals.len() && u64::from(other.intervals[j].end) < start {
                j += 1;
            }
            let mut k = j;
            while start <= end {
                let Some(cut) = other.intervals.get(k) else {
                    break;
                };
                let (cut_start, cut_end) = (u64::from(cut.start), u64::from(cut.end));
                if cut_start > end {
                    break;
                }
                if cut_start > start {
                    out.push(to_interval(start, cut_start - 1));
                }
                start = start.max(cut_end + 1);
                k += 1;
            }
            if start <= end {
                out.push(to_interval(start, end));
            }
        }
        Self { intervals: out }
    }

    /// `true` when every value of `self` is also in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.subtract(other).is_empty()
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        !self.intersect(other).is_empty()
    }
}

fn to_interval(start: u64, end: u64) -> Interval {
    // Callers only pass values derived from `u32` bounds.
    Interval {
        start: start as u32,
        end: end as u32,
    }
}

impl Display for IntervalSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.intervals.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::{Interval, IntervalSet};

    fn set(ranges: &[(u32, u32)]) -> IntervalSet {
        IntervalSet::from_intervals(
            ranges
                .iter()
                .map(|&(start, end)| Interval { start, end }),
        )
    }

    #[test]
    fn merges_adjacent_and_overlapping_ranges() {
        let s = set(&[(5, 9), (1, 3), (4, 4), (8, 12), (20, 21)]);
        assert_eq!(s.intervals(), set(&[(1, 12), (20, 21)]).intervals());
    }

    #[test]
    fn subtract_splits_ranges() {
        let s = set(&[(1, 100)]).subtract(&set(&[(10, 20), (50, 50)]));
        assert_eq!(s, set(&[(1, 9), (21, 49), (51, 100)]));
    }

    #[test]
    fn subtract_handles_u32_edges() {
        let all = IntervalSet::from_range(0, u32::MAX);
        let s = all.subtract(&IntervalSet::from_range(0, 0));
        assert_eq!(s, IntervalSet::from_range(1, u32::MAX));
        let s = all.subtract(&IntervalSet::from_range(u32::MAX, u32::MAX));
        assert_eq!(s.last(), Some(u32::MAX - 1));
        assert_eq!(s.first(), Some(0));
    }

    #[test]
    fn intersect_and_contains() {
        let a = set(&[(1, 10), (20, 30)]);
        let b = set(&[(5, 25)]);
        assert_eq!(a.intersect(&b), set(&[(5, 10), (20, 25)]));
        assert!(a.contains(20));
        assert!(!a.contains(15));
    }

    #[test]
    fn display_lists_ranges() {
        assert_eq!(set(&[(22, 22), (80, 90)]).to_string(), "22,80-90");
    }
}
