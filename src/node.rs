//! Node model and insertion engine.
//!
//! The tree is a closed set of two node kinds: a leaf holding exactly one
//! stored object, and a directory holding a bounding box, a persisted page
//! id and an optionally-resident list of children. Children are loaded on
//! demand through the [`NodeStore`]; an unresident directory's envelope is
//! authoritative from storage.

use std::cmp::Ordering;

use num_traits::Float;

use crate::error::{StorageError, StorageResult};
use crate::geometry::{BoundingRectangle, PointN, SpatialObject};
use crate::persistence::{LoadedNode, NodeStore, PageId};

type Scalar<T> = <<T as SpatialObject>::Point as PointN>::Scalar;

/// A node of the tree.
#[derive(Debug, Clone)]
pub enum RTreeNode<T: SpatialObject> {
    /// Holds exactly one stored object
    Leaf(T),
    /// Holds child nodes and their merged bounding box
    Directory(DirectoryNodeData<T>),
}

impl<T: SpatialObject> RTreeNode<T> {
    /// Minimum bounding rectangle of this node.
    pub fn mbr(&self) -> BoundingRectangle<T::Point> {
        match self {
            RTreeNode::Leaf(object) => object.minimum_bounding_rectangle(),
            RTreeNode::Directory(directory) => directory.envelope.clone(),
        }
    }

    fn depth(&self) -> usize {
        match self {
            RTreeNode::Leaf(_) => 0,
            RTreeNode::Directory(directory) => directory.depth,
        }
    }
}

/// Payload of a directory node.
///
/// `depth` is the height above the stored objects: a directory whose
/// children are leaves has depth 1. `children` is `None` while the node is
/// unresident; `load` populates it from storage.
#[derive(Debug, Clone)]
pub struct DirectoryNodeData<T: SpatialObject> {
    depth: usize,
    page: Option<PageId>,
    envelope: BoundingRectangle<T::Point>,
    children: Option<Vec<RTreeNode<T>>>,
}

/// Outcome of an insertion into a subtree, propagated to the parent.
pub(crate) enum InsertionResult<T: SpatialObject> {
    Complete,
    Split(RTreeNode<T>),
}

impl<T: SpatialObject> DirectoryNodeData<T> {
    /// New empty resident directory.
    pub(crate) fn new(depth: usize) -> Self {
        DirectoryNodeData {
            depth,
            page: None,
            envelope: BoundingRectangle::empty(),
            children: Some(Vec::new()),
        }
    }

    /// New resident directory over `children`, with its envelope computed.
    pub(crate) fn new_parent(children: Vec<RTreeNode<T>>, depth: usize) -> Self {
        let mut data = DirectoryNodeData {
            depth,
            page: None,
            envelope: BoundingRectangle::empty(),
            children: Some(children),
        };
        data.update_envelope();
        data
    }

    /// Unresident stub for a directory persisted at `page`.
    pub(crate) fn unresident(
        depth: usize,
        page: PageId,
        envelope: BoundingRectangle<T::Point>,
    ) -> Self {
        DirectoryNodeData {
            depth,
            page: Some(page),
            envelope,
            children: None,
        }
    }

    /// Resident directory rebuilt from a loaded page.
    pub(crate) fn from_loaded(page: PageId, loaded: LoadedNode<T>) -> Self {
        DirectoryNodeData {
            depth: loaded.depth as usize,
            page: Some(page),
            envelope: loaded.envelope,
            children: Some(loaded.children),
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn page(&self) -> Option<PageId> {
        self.page
    }

    pub(crate) fn assign_page(&mut self, page: PageId) {
        self.page = Some(page);
    }

    pub(crate) fn envelope(&self) -> &BoundingRectangle<T::Point> {
        &self.envelope
    }

    pub(crate) fn children(&self) -> Option<&Vec<RTreeNode<T>>> {
        self.children.as_ref()
    }

    /// Moves the resident children out, leaving the node unresident.
    pub(crate) fn take_children(&mut self) -> Vec<RTreeNode<T>> {
        self.children.take().unwrap_or_default()
    }

    /// Populates children from storage if they are absent.
    pub(crate) fn load(&mut self, store: &mut NodeStore<T>) -> StorageResult<()> {
        if self.children.is_some() {
            return Ok(());
        }
        let page = self.page.ok_or_else(|| {
            StorageError::Corrupted("unresident directory node has no page id".into())
        })?;
        let loaded = store.load(page)?;
        self.depth = loaded.depth as usize;
        self.envelope = loaded.envelope;
        self.children = Some(loaded.children);
        Ok(())
    }

    fn resident_children(&self) -> &[RTreeNode<T>] {
        match &self.children {
            Some(children) => children,
            None => panic!("directory children accessed before load"),
        }
    }

    fn resident_children_mut(&mut self) -> &mut Vec<RTreeNode<T>> {
        match &mut self.children {
            Some(children) => children,
            None => panic!("directory children accessed before load"),
        }
    }

    /// Recomputes the envelope as the merge of the children's boxes.
    pub(crate) fn update_envelope(&mut self) {
        let mut envelope = BoundingRectangle::empty();
        for child in self.resident_children() {
            envelope.merge(&child.mbr());
        }
        self.envelope = envelope;
    }

    /// Inserts `node` into this subtree, persisting every modified
    /// directory bottom-up. Returns `Split` when this node overflowed and
    /// the caller must adopt the new sibling.
    ///
    /// Loads happen before any structural change on the descent path, so a
    /// failed load aborts the insertion without touching ancestors; stores
    /// are buffered in the page cache and only become durable at flush.
    pub(crate) fn insert(
        &mut self,
        node: RTreeNode<T>,
        store: &mut NodeStore<T>,
    ) -> StorageResult<InsertionResult<T>> {
        self.load(store)?;

        if node.depth() + 1 == self.depth {
            self.resident_children_mut().push(node);
            self.update_envelope();
            return self.resolve_overflow(store);
        }

        let mbr = node.mbr();
        let index = self.choose_subtree(&mbr);
        let result = match &mut self.resident_children_mut()[index] {
            RTreeNode::Directory(child) => child.insert(node, store)?,
            RTreeNode::Leaf(_) => panic!("leaf child at directory depth {}", self.depth),
        };

        match result {
            InsertionResult::Split(sibling) => {
                self.resident_children_mut().push(sibling);
                self.update_envelope();
                self.resolve_overflow(store)
            }
            InsertionResult::Complete => {
                self.update_envelope();
                store.store(self)?;
                Ok(InsertionResult::Complete)
            }
        }
    }

    /// Picks the child whose box enlarges least to include `mbr`;
    /// ties go to the smaller resulting box, then the smaller existing box.
    fn choose_subtree(&self, mbr: &BoundingRectangle<T::Point>) -> usize {
        let mut best_index = 0;
        let mut best: Option<(Scalar<T>, Scalar<T>, Scalar<T>)> = None;

        for (index, child) in self.resident_children().iter().enumerate() {
            let child_mbr = child.mbr();
            let area = child_mbr.area();
            let merged_area = child_mbr.merged(mbr).area();
            let key = (merged_area - area, merged_area, area);

            let better = match &best {
                None => true,
                Some(current) => key < *current,
            };
            if better {
                best = Some(key);
                best_index = index;
            }
        }

        best_index
    }

    fn resolve_overflow(&mut self, store: &mut NodeStore<T>) -> StorageResult<InsertionResult<T>> {
        if self.resident_children().len() > store.max_node_size() {
            let sibling = self.split(store)?;
            log::debug!("split directory node at depth {}", self.depth);
            Ok(InsertionResult::Split(sibling))
        } else {
            store.store(self)?;
            Ok(InsertionResult::Complete)
        }
    }

    /// Linear-sweep area split: over every axis and every split index
    /// leaving both groups at least `min_node_size` children, picks the
    /// partition with the smallest sum of the two group areas. The
    /// split-off group becomes a new sibling, and both halves are stored.
    fn split(&mut self, store: &mut NodeStore<T>) -> StorageResult<RTreeNode<T>> {
        let min_size = store.min_node_size();
        let mut best_metric = <Scalar<T> as Float>::infinity();
        let mut best_axis = 0;
        let mut best_index = min_size;

        {
            let children = self.resident_children_mut();
            let count = children.len();
            for axis in 0..T::Point::dimensions() {
                sort_children_along(children, axis);

                // prefix[k] covers children[..k], suffix[k] covers children[k..]
                let mut prefix = vec![BoundingRectangle::empty(); count + 1];
                for k in 0..count {
                    prefix[k + 1] = prefix[k].merged(&children[k].mbr());
                }
                let mut suffix = vec![BoundingRectangle::empty(); count + 1];
                for k in (0..count).rev() {
                    suffix[k] = suffix[k + 1].merged(&children[k].mbr());
                }

                for k in min_size..=(count - min_size) {
                    let metric = prefix[k].area() + suffix[k].area();
                    if metric < best_metric {
                        best_metric = metric;
                        best_axis = axis;
                        best_index = k;
                    }
                }
            }
            sort_children_along(children, best_axis);
        }

        let split_off = self.resident_children_mut().split_off(best_index);
        let mut sibling = DirectoryNodeData::new_parent(split_off, self.depth);
        store.store(&mut sibling)?;

        self.update_envelope();
        store.store(self)?;
        Ok(RTreeNode::Directory(sibling))
    }
}

fn sort_children_along<T: SpatialObject>(children: &mut [RTreeNode<T>], axis: usize) {
    children.sort_by(|l, r| {
        let lv = l.mbr().lower().nth(axis);
        let rv = r.mbr().lower().nth(axis);
        lv.partial_cmp(&rv).unwrap_or(Ordering::Equal)
    });
}
