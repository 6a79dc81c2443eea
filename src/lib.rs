//! # Disk R-Tree - persistent spatial indexing
//!
//! A disk-backed R-Tree: a hierarchical spatial index over N-dimensional
//! objects that persists its node structure to a file and keeps only the
//! working set of nodes resident in memory.
//!
//! ## Features
//!
//! - **Disk-Based Storage**: nodes live in fixed-size checksummed pages,
//!   loaded on demand
//! - **Lazy Loading**: a directory's children stay on disk until a query or
//!   insertion actually descends into them
//! - **LRU Cache**: hot pages kept in memory, clean pages evicted first
//! - **Persistent**: data survives process restarts; pending writes are
//!   flushed when the tree is dropped
//! - **Generic Objects**: any `SpatialObject` over any fixed-dimension
//!   `PointN` coordinate type
//! - **Queries**: branch-and-bound nearest neighbor and lazy
//!   envelope-intersection iteration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use disk_rtree::{BoundingRectangle, PointN, RTree, SpatialObject};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
//! struct Point2D {
//!     x: f64,
//!     y: f64,
//! }
//!
//! impl PointN for Point2D {
//!     type Scalar = f64;
//!
//!     fn dimensions() -> usize {
//!         2
//!     }
//!
//!     fn from_value(value: f64) -> Self {
//!         Point2D { x: value, y: value }
//!     }
//!
//!     fn nth(&self, index: usize) -> f64 {
//!         match index {
//!             0 => self.x,
//!             1 => self.y,
//!             _ => panic!("dimension out of range"),
//!         }
//!     }
//!
//!     fn nth_mut(&mut self, index: usize) -> &mut f64 {
//!         match index {
//!             0 => &mut self.x,
//!             1 => &mut self.y,
//!             _ => panic!("dimension out of range"),
//!         }
//!     }
//! }
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! struct Place {
//!     location: Point2D,
//! }
//!
//! impl SpatialObject for Place {
//!     type Point = Point2D;
//!
//!     fn minimum_bounding_rectangle(&self) -> BoundingRectangle<Point2D> {
//!         BoundingRectangle::from_point(self.location)
//!     }
//!
//!     fn distance_squared(&self, point: &Point2D) -> f64 {
//!         let dx = point.x - self.location.x;
//!         let dy = point.y - self.location.y;
//!         dx * dx + dy * dy
//!     }
//! }
//!
//! # fn main() -> Result<(), disk_rtree::StorageError> {
//! let mut tree: RTree<Place> = RTree::open("places.rtree")?;
//!
//! tree.insert(Place {
//!     location: Point2D { x: 1.0, y: 1.0 },
//! })?;
//!
//! let nearest = tree.nearest_neighbor(&Point2D { x: 0.0, y: 0.0 })?;
//! assert!(nearest.is_some());
//!
//! let envelope = BoundingRectangle::new(
//!     Point2D { x: -10.0, y: -10.0 },
//!     Point2D { x: 10.0, y: 10.0 },
//! );
//! for place in tree.locate_in_envelope_intersecting(envelope) {
//!     println!("{:?}", place?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod constants;
pub mod error;
pub mod geometry;
pub mod node;
pub mod persistence;
pub mod query;
pub mod storage;
pub mod tree;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{StorageError, StorageResult};
pub use geometry::{BoundingRectangle, PointN, SpatialObject};
pub use persistence::{NodeStore, PageId};
pub use query::LocateInEnvelopeIntersecting;
pub use tree::{RTree, RTreeOptions};
