use crate::axes::AxisSet;
use crate::error::KilnError;
use std::fmt::{Display, Formatter};

/// Static shape of tensor
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Shape(Box<[usize]>);

impl Shape {
    /// Shape of a scalar
    #[must_use]
    pub fn scalar() -> Self {
        Self(Box::new([]))
    }

    /// Get shape's rank
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.0.len()
    }

    /// Get number of elements in tensor with this shape
    /// (a product of it's dimensions, 1 for scalars).
    #[must_use]
    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }

    /// Number of elements, None if it does not fit in usize
    #[must_use]
    pub fn checked_numel(&self) -> Option<usize> {
        self.0.iter().try_fold(1usize, |n, d| n.checked_mul(*d))
    }

    /// Dimensions as slice
    #[must_use]
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Iter
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    /// Get shape's row major strides
    #[must_use]
    pub fn strides(&self) -> Shape {
        let mut a = 1;
        let mut strides: Vec<usize> = self
            .0
            .iter()
            .rev()
            .map(|d| {
                let t = a;
                a *= d;
                t
            })
            .collect();
        strides.reverse();
        Shape(strides.into())
    }

    /// Remove axes from self, reductions drop the reduced dimensions
    #[must_use]
    pub fn remove_axes(&self, axes: &AxisSet) -> Shape {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(a, d)| if axes.contains(a) { None } else { Some(*d) })
            .collect()
    }

    /// Dimensions as i64, the encoding used by shape constants
    #[must_use]
    pub fn to_i64_vec(&self) -> Vec<i64> {
        self.0.iter().map(|d| *d as i64).collect()
    }
}

impl std::ops::Index<usize> for Shape {
    type Output = usize;
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl FromIterator<usize> for Shape {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Shape(iter.into_iter().collect())
    }
}

impl From<Vec<usize>> for Shape {
    fn from(value: Vec<usize>) -> Self {
        Shape(value.into())
    }
}

impl From<&[usize]> for Shape {
    fn from(value: &[usize]) -> Self {
        Shape(value.into())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(value: [usize; N]) -> Self {
        Shape(value.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Shape {
    type IntoIter = <&'a [usize] as IntoIterator>::IntoIter;
    type Item = &'a usize;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{d}")?;
        }
        f.write_str("}")
    }
}

/// One dimension of a [PartialShape]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Known length, negative lengths are representable so that they can be rejected
    Known(i64),
    /// Length is not known yet
    Unknown,
}

impl Dimension {
    /// Is length of this dimension known?
    #[must_use]
    pub const fn is_static(self) -> bool {
        matches!(self, Dimension::Known(_))
    }

    /// Length of this dimension, if known
    #[must_use]
    pub const fn length(self) -> Option<i64> {
        match self {
            Dimension::Known(d) => Some(d),
            Dimension::Unknown => None,
        }
    }

    /// Two dimensions are compatible if either is unknown or both are equal
    #[must_use]
    pub fn compatible(self, other: Dimension) -> bool {
        match (self, other) {
            (Dimension::Known(a), Dimension::Known(b)) => a == b,
            _ => true,
        }
    }

    /// Merge two dimensions into the more specific one
    pub fn merge(self, other: Dimension) -> Result<Dimension, KilnError> {
        match (self, other) {
            (Dimension::Known(a), Dimension::Known(b)) if a != b => {
                Err(KilnError::IncompatibleShapes {
                    context: "dimension merge".into(),
                    lhs: self.to_string(),
                    rhs: other.to_string(),
                })
            }
            (Dimension::Unknown, d) | (d, Dimension::Unknown) => Ok(d),
            (d, _) => Ok(d),
        }
    }
}

impl From<usize> for Dimension {
    fn from(value: usize) -> Self {
        Dimension::Known(value as i64)
    }
}

impl From<i64> for Dimension {
    fn from(value: i64) -> Self {
        Dimension::Known(value)
    }
}

impl Display for Dimension {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Dimension::Known(d) => write!(f, "{d}"),
            Dimension::Unknown => f.write_str("?"),
        }
    }
}

/// Shape whose rank or individual dimensions may be unknown.
///
/// `None` rank means the shape is fully dynamic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartialShape(Option<Vec<Dimension>>);

impl PartialShape {
    /// Fully dynamic shape, rank is unknown
    #[must_use]
    pub const fn dynamic() -> Self {
        Self(None)
    }

    /// Shape with known rank and all dimensions unknown
    #[must_use]
    pub fn dynamic_of_rank(rank: usize) -> Self {
        Self(Some(vec![Dimension::Unknown; rank]))
    }

    /// Ranked shape from dimensions
    #[must_use]
    pub fn ranked(dims: impl IntoIterator<Item = Dimension>) -> Self {
        Self(Some(dims.into_iter().collect()))
    }

    /// Rank, if known
    #[must_use]
    pub fn rank(&self) -> Option<usize> {
        self.0.as_ref().map(Vec::len)
    }

    /// Is rank known?
    #[must_use]
    pub const fn is_rank_static(&self) -> bool {
        self.0.is_some()
    }

    /// Dimensions, if rank is known
    #[must_use]
    pub fn dims(&self) -> Option<&[Dimension]> {
        self.0.as_deref()
    }

    /// Shape is static iff rank is known and every dimension is known
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.0
            .as_ref()
            .is_some_and(|dims| dims.iter().all(|d| d.is_static()))
    }

    /// Are all known dimensions non negative?
    #[must_use]
    pub fn all_non_negative(&self) -> bool {
        self.0.as_ref().map_or(true, |dims| {
            dims.iter().all(|d| d.length().map_or(true, |l| l >= 0))
        })
    }

    /// Convert to static shape, fails if any dimension is unknown
    pub fn to_shape(&self) -> Result<Shape, KilnError> {
        match &self.0 {
            Some(dims) if self.is_static() && self.all_non_negative() => Ok(dims
                .iter()
                .filter_map(|d| d.length())
                .map(|d| d as usize)
                .collect()),
            _ if !self.all_non_negative() => Err(KilnError::NegativeDimension {
                context: "to_shape".into(),
                shape: self.to_string(),
            }),
            _ => Err(KilnError::DynamicShape {
                context: "to_shape".into(),
                shape: self.to_string(),
            }),
        }
    }

    /// Are the two shapes compatible, that is can they be merged?
    #[must_use]
    pub fn compatible(&self, other: &PartialShape) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.compatible(*y))
            }
            _ => true,
        }
    }

    /// Is self at least as specific as other while still compatible with it?
    #[must_use]
    pub fn refines(&self, other: &PartialShape) -> bool {
        match (&self.0, &other.0) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| match (x, y) {
                        (_, Dimension::Unknown) => true,
                        (Dimension::Known(x), Dimension::Known(y)) => x == y,
                        (Dimension::Unknown, Dimension::Known(_)) => false,
                    })
            }
        }
    }

    /// Merge other into self, keeping the more specific information from both
    pub fn merge_into(&mut self, other: &PartialShape) -> Result<(), KilnError> {
        match (&mut self.0, &other.0) {
            (_, None) => Ok(()),
            (None, Some(_)) => {
                *self = other.clone();
                Ok(())
            }
            (Some(a), Some(b)) => {
                if a.len() != b.len() {
                    return Err(KilnError::IncompatibleShapes {
                        context: "shape merge".into(),
                        lhs: PartialShape(Some(a.clone())).to_string(),
                        rhs: other.to_string(),
                    });
                }
                let merged = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| x.merge(*y))
                    .collect::<Result<Vec<Dimension>, KilnError>>()
                    .map_err(|_| KilnError::IncompatibleShapes {
                        context: "shape merge".into(),
                        lhs: PartialShape(Some(a.clone())).to_string(),
                        rhs: other.to_string(),
                    })?;
                *a = merged;
                Ok(())
            }
        }
    }

    /// Merge two shapes into a new one
    pub fn merge(lhs: &PartialShape, rhs: &PartialShape) -> Result<PartialShape, KilnError> {
        let mut res = lhs.clone();
        res.merge_into(rhs)?;
        Ok(res)
    }
}

impl From<Shape> for PartialShape {
    fn from(value: Shape) -> Self {
        PartialShape(Some(value.iter().map(Dimension::from).collect()))
    }
}

impl From<&Shape> for PartialShape {
    fn from(value: &Shape) -> Self {
        PartialShape(Some(value.iter().map(Dimension::from).collect()))
    }
}

impl<const N: usize> From<[usize; N]> for PartialShape {
    fn from(value: [usize; N]) -> Self {
        PartialShape(Some(value.into_iter().map(Dimension::from).collect()))
    }
}

impl<const N: usize> From<[Dimension; N]> for PartialShape {
    fn from(value: [Dimension; N]) -> Self {
        PartialShape(Some(value.into()))
    }
}

impl Display for PartialShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let Some(dims) = &self.0 else {
            return f.write_str("?");
        };
        f.write_str("{")?;
        for (i, d) in dims.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{d}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_has_one_element() {
        assert_eq!(Shape::scalar().numel(), 1);
        assert_eq!(Shape::from([3, 0, 2]).numel(), 0);
    }

    #[test]
    fn strides_are_row_major() {
        assert_eq!(Shape::from([2, 3, 4]).strides(), Shape::from([12, 4, 1]));
    }

    #[test]
    fn dynamic_shape_is_not_static() {
        let s = PartialShape::ranked([Dimension::Known(2), Dimension::Unknown]);
        assert!(!s.is_static());
        assert!(matches!(s.to_shape(), Err(KilnError::DynamicShape { .. })));
        assert!(!PartialShape::dynamic().is_static());
        assert_eq!(
            PartialShape::from([2, 3]).to_shape().unwrap(),
            Shape::from([2, 3])
        );
    }

    #[test]
    fn merge_takes_more_specific_dimension() {
        let a = PartialShape::ranked([Dimension::Known(2), Dimension::Unknown]);
        let b = PartialShape::ranked([Dimension::Unknown, Dimension::Known(5)]);
        assert_eq!(PartialShape::merge(&a, &b).unwrap(), PartialShape::from([2, 5]));
        assert_eq!(
            PartialShape::merge(&PartialShape::dynamic(), &a).unwrap(),
            a
        );
        let c = PartialShape::from([3, 5]);
        assert!(matches!(
            PartialShape::merge(&a, &c),
            Err(KilnError::IncompatibleShapes { .. })
        ));
    }

    #[test]
    fn negative_dimensions_are_detected() {
        let s = PartialShape::ranked([Dimension::Known(-1), Dimension::Known(2)]);
        assert!(!s.all_non_negative());
        assert!(PartialShape::dynamic().all_non_negative());
    }

    #[test]
    fn refinement() {
        let a = PartialShape::from([2, 5]);
        let b = PartialShape::ranked([Dimension::Unknown, Dimension::Known(5)]);
        assert!(a.refines(&b));
        assert!(!b.refines(&a));
        assert!(b.refines(&PartialShape::dynamic()));
        assert_eq!(b.to_string(), "{?,5}");
    }
}
