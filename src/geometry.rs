//! Geometric primitives: point and object capabilities, bounding rectangles.
//!
//! All tree components work against two caller-supplied capabilities:
//! [`PointN`] for fixed-dimension coordinates and [`SpatialObject`] for the
//! values stored in the tree. [`BoundingRectangle`] is the axis-aligned box
//! used throughout for grouping, pruning and distance bounds.

use num_traits::{Float, One, Zero};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// An N-dimensional point with a fixed dimensionality.
///
/// Dimensionality is a property of the type, so two points of the same
/// `PointN` type can never disagree on their number of dimensions.
pub trait PointN: Clone + PartialEq + Debug + Serialize + DeserializeOwned {
    /// Coordinate scalar type
    type Scalar: Float + Debug;

    /// Number of dimensions of every point of this type
    fn dimensions() -> usize;

    /// Builds a point with `value` in every component.
    fn from_value(value: Self::Scalar) -> Self;

    /// Returns the component at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= Self::dimensions()`.
    fn nth(&self, index: usize) -> Self::Scalar;

    /// Mutable access to the component at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= Self::dimensions()`.
    fn nth_mut(&mut self, index: usize) -> &mut Self::Scalar;
}

/// A value that can be stored in the tree.
///
/// Objects are immutable once inserted. They are persisted inline in their
/// parent directory's page, which is why the trait requires serde support.
pub trait SpatialObject: Clone + Serialize + DeserializeOwned {
    /// Point type the object is measured against
    type Point: PointN;

    /// Smallest axis-aligned rectangle containing the object.
    fn minimum_bounding_rectangle(&self) -> BoundingRectangle<Self::Point>;

    /// Squared Euclidean distance from the object itself to `point`.
    ///
    /// This is the exact distance, not the distance to the object's MBR; it
    /// must never be smaller than the MBR's
    /// [`BoundingRectangle::distance_squared`] for the same point.
    fn distance_squared(&self, point: &Self::Point) -> <Self::Point as PointN>::Scalar;
}

/// An axis-aligned rectangle given by its lower and upper corners.
///
/// Invariant: `lower[i] <= upper[i]` for every dimension `i`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingRectangle<P> {
    lower: P,
    upper: P,
}

impl<P: PointN> BoundingRectangle<P> {
    /// Creates a rectangle from its two corners.
    ///
    /// # Panics
    ///
    /// Panics if `lower[i] > upper[i]` in any dimension. Malformed geometry
    /// is a programming error, not a recoverable condition.
    pub fn new(lower: P, upper: P) -> Self {
        for i in 0..P::dimensions() {
            assert!(
                lower.nth(i) <= upper.nth(i),
                "malformed bounding rectangle: lower {:?} exceeds upper {:?} in dimension {}",
                lower,
                upper,
                i
            );
        }
        BoundingRectangle { lower, upper }
    }

    /// Degenerate rectangle covering a single point.
    pub fn from_point(point: P) -> Self {
        BoundingRectangle {
            lower: point.clone(),
            upper: point,
        }
    }

    /// The identity element for [`merge`](Self::merge): inverted infinite
    /// corners, so merging it with any rectangle yields that rectangle.
    /// Never exposed as a user-visible rectangle.
    pub(crate) fn empty() -> Self {
        BoundingRectangle {
            lower: P::from_value(Float::infinity()),
            upper: P::from_value(Float::neg_infinity()),
        }
    }

    /// Lower corner
    pub fn lower(&self) -> &P {
        &self.lower
    }

    /// Upper corner
    pub fn upper(&self) -> &P {
        &self.upper
    }

    /// True iff the rectangles overlap or touch in every dimension.
    pub fn intersects(&self, other: &Self) -> bool {
        (0..P::dimensions()).all(|i| {
            self.lower.nth(i) <= other.upper.nth(i) && other.lower.nth(i) <= self.upper.nth(i)
        })
    }

    /// Grows this rectangle to the smallest one containing both operands.
    pub fn merge(&mut self, other: &Self) {
        for i in 0..P::dimensions() {
            let lower = self.lower.nth(i).min(other.lower.nth(i));
            let upper = self.upper.nth(i).max(other.upper.nth(i));
            *self.lower.nth_mut(i) = lower;
            *self.upper.nth_mut(i) = upper;
        }
    }

    /// Smallest rectangle containing both operands.
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }

    /// Product of the extents; zero for degenerate rectangles.
    pub fn area(&self) -> P::Scalar {
        let mut area = P::Scalar::one();
        for i in 0..P::dimensions() {
            area = area * (self.upper.nth(i) - self.lower.nth(i)).max(P::Scalar::zero());
        }
        area
    }

    /// How much this rectangle's area grows when merged with `other`.
    pub fn enlargement(&self, other: &Self) -> P::Scalar {
        self.merged(other).area() - self.area()
    }

    /// Squared distance from `point` to the nearest point on or in the
    /// rectangle (MINDIST). Zero when the point is inside.
    pub fn distance_squared(&self, point: &P) -> P::Scalar {
        let mut total = P::Scalar::zero();
        for i in 0..P::dimensions() {
            let below = self.lower.nth(i) - point.nth(i);
            let above = point.nth(i) - self.upper.nth(i);
            let d = below.max(above).max(P::Scalar::zero());
            total = total + d * d;
        }
        total
    }
}
