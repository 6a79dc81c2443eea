//! The persistence adapter: maps directory node identifiers to serialized
//! node pages and back.
//!
//! Only directory nodes are addressable by [`PageId`]; stored objects live
//! inline in their parent directory's page. `store` never touches the file:
//! it buffers the encoded node in the page cache as dirty, so a multi-step
//! insertion cannot be torn by an I/O failure halfway through. Durable state
//! changes only in [`NodeStore::flush`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cache::PageCache;
use crate::error::{StorageError, StorageResult};
use crate::geometry::{BoundingRectangle, SpatialObject};
use crate::node::{DirectoryNodeData, RTreeNode};
use crate::storage::{FileHeader, Storage};
use crate::tree::RTreeOptions;

pub use crate::storage::PageId;

/// One child entry in a persisted directory node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum PersistedChild<T, P> {
    Leaf(T),
    Directory {
        envelope: BoundingRectangle<P>,
        page: PageId,
    },
}

/// On-disk form of a directory node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PersistedNode<T, P> {
    depth: u32,
    envelope: BoundingRectangle<P>,
    children: Vec<PersistedChild<T, P>>,
}

/// A directory node materialized from storage: its own box plus its
/// children, where child directories come back as unresident stubs.
pub(crate) struct LoadedNode<T: SpatialObject> {
    pub depth: u32,
    pub envelope: BoundingRectangle<T::Point>,
    pub children: Vec<RTreeNode<T>>,
}

/// The sole path to durable state. Owns the backing file handle, the page
/// cache and the in-memory copy of the file header.
pub struct NodeStore<T: SpatialObject> {
    storage: Storage,
    cache: PageCache<PersistedNode<T, T::Point>>,
    header: FileHeader,
}

impl<T: SpatialObject> NodeStore<T> {
    /// Opens the store at `path`, initializing a fresh file when the
    /// location is new or empty. Fanout parameters of an existing file win
    /// over the ones in `options`.
    pub(crate) fn open_or_create(path: &Path, options: &RTreeOptions) -> StorageResult<Self> {
        let exists = path.exists() && std::fs::metadata(path)?.len() > 0;
        let (storage, header) = if exists {
            let mut storage = Storage::open(path)?;
            let header = storage.read_header()?;
            header.validate()?;
            log::debug!(
                "opened existing R-tree at {:?} ({} entries)",
                path,
                header.entry_count
            );
            (storage, header)
        } else {
            let mut storage = Storage::create(path)?;
            let header = FileHeader::new(
                options.max_node_size() as u32,
                options.min_node_size() as u32,
            );
            storage.write_header(&header)?;
            storage.sync()?;
            log::debug!("created new R-tree at {:?}", path);
            (storage, header)
        };

        Ok(NodeStore {
            storage,
            cache: PageCache::new(options.cache_pages()),
            header,
        })
    }

    pub(crate) fn header(&self) -> &FileHeader {
        &self.header
    }

    pub(crate) fn header_mut(&mut self) -> &mut FileHeader {
        &mut self.header
    }

    pub(crate) fn max_node_size(&self) -> usize {
        self.header.max_node_size as usize
    }

    pub(crate) fn min_node_size(&self) -> usize {
        self.header.min_node_size as usize
    }

    fn allocate_page(&mut self) -> PageId {
        let page_id = self.header.next_page_id;
        self.header.next_page_id += 1;
        page_id
    }

    /// Loads the directory node stored at `page_id`, cache first, then one
    /// page read from disk.
    pub(crate) fn load(&mut self, page_id: PageId) -> StorageResult<LoadedNode<T>> {
        if let Some(node) = self.cache.get(page_id) {
            return Ok(Self::materialize(node.clone()));
        }

        let node: PersistedNode<T, T::Point> = self.storage.read_page(page_id)?;
        self.cache.insert(page_id, node.clone(), false);
        self.cache.shrink_to_capacity();
        Ok(Self::materialize(node))
    }

    fn materialize(node: PersistedNode<T, T::Point>) -> LoadedNode<T> {
        let child_depth = node.depth.saturating_sub(1) as usize;
        let children = node
            .children
            .into_iter()
            .map(|child| match child {
                PersistedChild::Leaf(object) => RTreeNode::Leaf(object),
                PersistedChild::Directory { envelope, page } => RTreeNode::Directory(
                    DirectoryNodeData::unresident(child_depth, page, envelope),
                ),
            })
            .collect();

        LoadedNode {
            depth: node.depth,
            envelope: node.envelope,
            children,
        }
    }

    /// Persists a directory node, assigning a page id on first store.
    ///
    /// The node's children must be resident and child directories must have
    /// been stored already, so insertion re-stores modified nodes bottom-up.
    pub(crate) fn store(&mut self, node: &mut DirectoryNodeData<T>) -> StorageResult<PageId> {
        let children = node.children().ok_or_else(|| {
            StorageError::Corrupted("attempted to store an unresident directory node".into())
        })?;

        let mut persisted_children = Vec::with_capacity(children.len());
        for child in children {
            match child {
                RTreeNode::Leaf(object) => {
                    persisted_children.push(PersistedChild::Leaf(object.clone()));
                }
                RTreeNode::Directory(directory) => {
                    let page = directory.page().ok_or_else(|| {
                        StorageError::Corrupted(
                            "child directory referenced before it was stored".into(),
                        )
                    })?;
                    persisted_children.push(PersistedChild::Directory {
                        envelope: directory.envelope().clone(),
                        page,
                    });
                }
            }
        }

        let persisted = PersistedNode {
            depth: node.depth() as u32,
            envelope: node.envelope().clone(),
            children: persisted_children,
        };

        let page_id = match node.page() {
            Some(page_id) => page_id,
            None => {
                let page_id = self.allocate_page();
                node.assign_page(page_id);
                page_id
            }
        };

        self.cache.insert(page_id, persisted, true);
        self.cache.shrink_to_capacity();
        Ok(page_id)
    }

    /// Writes all dirty pages, then the header, then syncs the file.
    pub(crate) fn flush(&mut self) -> StorageResult<()> {
        let mut dirty = self.cache.dirty_pages();
        dirty.sort_unstable();
        for page_id in dirty {
            if let Some(node) = self.cache.peek(page_id) {
                self.storage.write_page(page_id, node)?;
            }
            self.cache.mark_clean(page_id);
        }
        self.storage.write_header(&self.header)?;
        self.storage.sync()?;
        Ok(())
    }
}
