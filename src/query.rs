//! Query algorithms: nearest-neighbor search and envelope intersection.
//!
//! Both traverse value copies of the node tree materialized through the
//! page cache, so they never alias the resident tree and never observe
//! later mutations.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::StorageResult;
use crate::geometry::{BoundingRectangle, PointN, SpatialObject};
use crate::node::RTreeNode;
use crate::persistence::NodeStore;

type Scalar<T> = <<T as SpatialObject>::Point as PointN>::Scalar;

/// Priority-queue entry: a node keyed by its minimum possible distance to
/// the query point. Ordered as a min-heap inside `BinaryHeap`.
struct NearestEntry<T: SpatialObject> {
    distance: Scalar<T>,
    node: RTreeNode<T>,
}

impl<T: SpatialObject> PartialEq for NearestEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}

impl<T: SpatialObject> Eq for NearestEntry<T> {}

impl<T: SpatialObject> PartialOrd for NearestEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: SpatialObject> Ord for NearestEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: smaller distance = higher priority
        other
            .distance
            .partial_cmp(&self.distance)
            .unwrap_or(Ordering::Equal)
    }
}

/// Queue key for a node: the exact object distance for a leaf, MINDIST to
/// the envelope for a directory. A leaf's key is never below its own MBR's
/// MINDIST, which is what makes the early return below correct.
fn node_distance<T: SpatialObject>(node: &RTreeNode<T>, point: &T::Point) -> Scalar<T> {
    match node {
        RTreeNode::Leaf(object) => object.distance_squared(point),
        RTreeNode::Directory(directory) => directory.envelope().distance_squared(point),
    }
}

/// Branch-and-bound nearest-neighbor search.
///
/// Pops the minimum-key entry off the queue; a popped leaf is the answer,
/// since no unexamined entry can have a smaller true distance. Popped
/// directories are loaded on demand and their children enqueued.
pub(crate) fn nearest_neighbor<T: SpatialObject>(
    root: Option<RTreeNode<T>>,
    point: &T::Point,
    store: &mut NodeStore<T>,
) -> StorageResult<Option<T>> {
    let Some(root) = root else {
        return Ok(None);
    };

    let mut queue = BinaryHeap::new();
    queue.push(NearestEntry {
        distance: node_distance(&root, point),
        node: root,
    });

    while let Some(entry) = queue.pop() {
        match entry.node {
            RTreeNode::Leaf(object) => return Ok(Some(object)),
            RTreeNode::Directory(mut directory) => {
                directory.load(store)?;
                for child in directory.take_children() {
                    queue.push(NearestEntry {
                        distance: node_distance(&child, point),
                        node: child,
                    });
                }
            }
        }
    }

    Ok(None)
}

/// Lazy sequence of stored objects whose MBR intersects a query envelope.
///
/// Depth-first over an explicit stack; sibling order is unspecified.
/// Directories are pruned whole when their box misses the envelope and
/// loaded on demand otherwise; a leaf is yielded only if its own MBR
/// intersects the envelope. Each match is produced at most once and the
/// sequence is not restartable.
pub struct LocateInEnvelopeIntersecting<'a, T: SpatialObject> {
    store: &'a mut NodeStore<T>,
    nodes: Vec<RTreeNode<T>>,
    envelope: BoundingRectangle<T::Point>,
}

impl<'a, T: SpatialObject> LocateInEnvelopeIntersecting<'a, T> {
    pub(crate) fn new(
        root: Option<RTreeNode<T>>,
        envelope: BoundingRectangle<T::Point>,
        store: &'a mut NodeStore<T>,
    ) -> Self {
        LocateInEnvelopeIntersecting {
            store,
            nodes: root.into_iter().collect(),
            envelope,
        }
    }
}

impl<'a, T: SpatialObject> Iterator for LocateInEnvelopeIntersecting<'a, T> {
    /// A load failure mid-traversal surfaces as an `Err` item.
    type Item = StorageResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.nodes.pop() {
            match node {
                RTreeNode::Directory(mut directory) => {
                    if !directory.envelope().intersects(&self.envelope) {
                        continue;
                    }
                    if let Err(err) = directory.load(self.store) {
                        return Some(Err(err));
                    }
                    self.nodes.extend(directory.take_children());
                }
                RTreeNode::Leaf(object) => {
                    if object
                        .minimum_bounding_rectangle()
                        .intersects(&self.envelope)
                    {
                        return Some(Ok(object));
                    }
                }
            }
        }
        None
    }
}
