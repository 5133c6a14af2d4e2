use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Sorted set of axis positions, used by reductions and broadcasts.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AxisSet(BTreeSet<usize>);

impl AxisSet {
    /// Empty axis set
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Iterate over axes in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    /// Number of axes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Is this set empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Does this set contain axis?
    #[must_use]
    pub fn contains(&self, axis: usize) -> bool {
        self.0.contains(&axis)
    }

    /// Insert axis, returns false if it was already present
    pub fn insert(&mut self, axis: usize) -> bool {
        self.0.insert(axis)
    }

    /// Largest axis in the set
    #[must_use]
    pub fn max(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Axes of `0..rank` that are not in self
    #[must_use]
    pub fn complement(&self, rank: usize) -> AxisSet {
        (0..rank).filter(|a| !self.0.contains(a)).collect()
    }

    /// Axes as a vector of i64, the encoding used by axis constants
    #[must_use]
    pub fn to_i64_vec(&self) -> Vec<i64> {
        self.0.iter().map(|a| *a as i64).collect()
    }
}

impl FromIterator<usize> for AxisSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[usize; N]> for AxisSet {
    fn from(value: [usize; N]) -> Self {
        value.into_iter().collect()
    }
}

impl From<&[usize]> for AxisSet {
    fn from(value: &[usize]) -> Self {
        value.iter().copied().collect()
    }
}

impl<'a> IntoIterator for &'a AxisSet {
    type IntoIter = std::iter::Copied<std::collections::btree_set::Iter<'a, usize>>;
    type Item = usize;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}

impl Display for AxisSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (i, axis) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{axis}")?;
        }
        f.write_str("}")
    }
}

#[test]
fn complement_of_broadcast_axes() {
    let axes = AxisSet::from([0, 2]);
    assert_eq!(axes.complement(4), AxisSet::from([1, 3]));
    assert_eq!(AxisSet::from([1, 3, 4]).complement(5), axes);
    assert_eq!(axes.to_string(), "{0,2}");
}
