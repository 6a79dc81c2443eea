//! Shared fixtures for unit tests.

use crate::geometry::{BoundingRectangle, PointN, SpatialObject};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Point2D { x, y }
    }
}

impl PointN for Point2D {
    type Scalar = f64;

    fn dimensions() -> usize {
        2
    }

    fn from_value(value: f64) -> Self {
        Point2D { x: value, y: value }
    }

    fn nth(&self, index: usize) -> f64 {
        match index {
            0 => self.x,
            1 => self.y,
            _ => panic!("point dimension out of range: {index}"),
        }
    }

    fn nth_mut(&mut self, index: usize) -> &mut f64 {
        match index {
            0 => &mut self.x,
            1 => &mut self.y,
            _ => panic!("point dimension out of range: {index}"),
        }
    }
}

/// A stored point object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct Element {
    pub point: Point2D,
}

impl Element {
    pub fn new(x: f64, y: f64) -> Self {
        Element {
            point: Point2D::new(x, y),
        }
    }
}

impl SpatialObject for Element {
    type Point = Point2D;

    fn minimum_bounding_rectangle(&self) -> BoundingRectangle<Point2D> {
        BoundingRectangle::from_point(self.point)
    }

    fn distance_squared(&self, point: &Point2D) -> f64 {
        let dx = point.x - self.point.x;
        let dy = point.y - self.point.y;
        dx * dx + dy * dy
    }
}
