//! The disk-backed R-Tree.

use std::mem;
use std::path::Path;

use crate::constants::{DEFAULT_CACHE_PAGES, DEFAULT_MAX_NODE_SIZE, DEFAULT_MIN_NODE_SIZE};
use crate::error::{StorageError, StorageResult};
use crate::geometry::{BoundingRectangle, SpatialObject};
use crate::node::{DirectoryNodeData, InsertionResult, RTreeNode};
use crate::persistence::NodeStore;
use crate::query::{self, LocateInEnvelopeIntersecting};

/// Tuning knobs for a tree. Fanout parameters are persisted in the file
/// header on creation; when reopening an existing file the stored values
/// win, so one file is never maintained with two different geometries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RTreeOptions {
    max_node_size: usize,
    min_node_size: usize,
    cache_pages: usize,
}

impl Default for RTreeOptions {
    fn default() -> Self {
        RTreeOptions {
            max_node_size: DEFAULT_MAX_NODE_SIZE,
            min_node_size: DEFAULT_MIN_NODE_SIZE,
            cache_pages: DEFAULT_CACHE_PAGES,
        }
    }
}

impl RTreeOptions {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set_max_node_size(mut self, max_node_size: usize) -> Self {
        assert!(max_node_size > self.min_node_size);
        self.max_node_size = max_node_size;
        self
    }

    pub fn set_min_node_size(mut self, min_node_size: usize) -> Self {
        assert!(min_node_size >= 1 && min_node_size < self.max_node_size);
        self.min_node_size = min_node_size;
        self
    }

    pub fn set_cache_pages(mut self, cache_pages: usize) -> Self {
        assert!(cache_pages >= 1);
        self.cache_pages = cache_pages;
        self
    }

    pub fn max_node_size(&self) -> usize {
        self.max_node_size
    }

    pub fn min_node_size(&self) -> usize {
        self.min_node_size
    }

    pub fn cache_pages(&self) -> usize {
        self.cache_pages
    }

    /// A split must be able to give both groups `min_node_size` children
    /// out of `max_node_size + 1`.
    fn validate(&self) {
        assert!(
            self.max_node_size + 1 >= 2 * self.min_node_size,
            "max_node_size {} cannot satisfy min_node_size {} on split",
            self.max_node_size,
            self.min_node_size
        );
    }
}

/// A disk-backed R-Tree over objects of type `T`.
///
/// The tree owns the root node and, transitively, all resident node data;
/// the backing file handle lives in the persistence adapter and is released
/// when the tree goes out of scope, after flushing pending writes.
///
/// Access is single-threaded and synchronous: every operation completes or
/// fails before returning, and callers needing concurrency must serialize
/// access externally.
pub struct RTree<T: SpatialObject> {
    root: Option<DirectoryNodeData<T>>,
    store: NodeStore<T>,
}

impl<T: SpatialObject> RTree<T> {
    /// Opens the tree backed by the file at `path`, creating an empty tree
    /// if the store is new.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with_options(path, RTreeOptions::default())
    }

    /// Opens with custom fanout and cache tuning.
    pub fn open_with_options(path: impl AsRef<Path>, options: RTreeOptions) -> StorageResult<Self> {
        options.validate();
        let mut store = NodeStore::open_or_create(path.as_ref(), &options)?;

        let root = match store.header().root_page {
            0 => None,
            page => {
                let loaded = store.load(page)?;
                Some(DirectoryNodeData::from_loaded(page, loaded))
            }
        };

        Ok(RTree { root, store })
    }

    /// Number of stored objects. O(1).
    pub fn size(&self) -> u64 {
        self.store.header().entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Height of the tree; 0 when empty, 1 when the root holds leaves.
    pub fn height(&self) -> u32 {
        self.store.header().height
    }

    /// Inserts an object, splitting overflowing directory nodes on the way
    /// back up. The root may be replaced when it overflows, growing the
    /// tree by one level.
    ///
    /// On a storage error the insertion is aborted: all node writes are
    /// buffered in the page cache until [`flush`](Self::flush), and the
    /// loads that can fail happen before the descent path is mutated.
    pub fn insert(&mut self, object: T) -> StorageResult<()> {
        let leaf = RTreeNode::Leaf(object);

        match &mut self.root {
            None => {
                let mut root = DirectoryNodeData::new(1);
                root.insert(leaf, &mut self.store)?;
                self.root = Some(root);
            }
            Some(root) => {
                if let InsertionResult::Split(sibling) = root.insert(leaf, &mut self.store)? {
                    let depth = root.depth() + 1;
                    let old_root = mem::replace(root, DirectoryNodeData::new(depth));
                    *root = DirectoryNodeData::new_parent(
                        vec![RTreeNode::Directory(old_root), sibling],
                        depth,
                    );
                    self.store.store(root)?;
                    log::debug!("root split, tree height is now {depth}");
                }
            }
        }

        if let Some(root) = &self.root {
            let page = root.page().ok_or_else(|| {
                StorageError::Corrupted("root directory was not assigned a page".into())
            })?;
            let header = self.store.header_mut();
            header.root_page = page;
            header.height = root.depth() as u32;
        }
        self.store.header_mut().entry_count += 1;
        Ok(())
    }

    /// Returns the stored object nearest to `point`, or `None` for an
    /// empty tree. Fails only when a node load fails.
    pub fn nearest_neighbor(&mut self, point: &T::Point) -> StorageResult<Option<T>> {
        let root = self.root_stub();
        query::nearest_neighbor(root, point, &mut self.store)
    }

    /// Iterates over all stored objects whose MBR intersects `envelope`
    /// (touching and containment both count). Order is unspecified.
    pub fn locate_in_envelope_intersecting(
        &mut self,
        envelope: BoundingRectangle<T::Point>,
    ) -> LocateInEnvelopeIntersecting<'_, T> {
        let root = self.root_stub();
        LocateInEnvelopeIntersecting::new(root, envelope, &mut self.store)
    }

    /// Writes all buffered pages and the header, then syncs the file.
    pub fn flush(&mut self) -> StorageResult<()> {
        self.store.flush()
    }

    /// Unresident copy of the root for queries to traverse; queries load
    /// through the page cache instead of walking the resident tree.
    fn root_stub(&self) -> Option<RTreeNode<T>> {
        let root = self.root.as_ref()?;
        let page = root.page()?;
        Some(RTreeNode::Directory(DirectoryNodeData::unresident(
            root.depth(),
            page,
            root.envelope().clone(),
        )))
    }
}

impl<T: SpatialObject> Drop for RTree<T> {
    fn drop(&mut self) {
        if let Err(err) = self.store.flush() {
            log::error!("failed to flush R-tree to disk on drop: {err}");
        }
    }
}
