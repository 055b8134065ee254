//! Source import, hierarchy and file descriptor operations

use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::ids::SourceId;
use crate::model::source::build_forest;
use crate::model::{HierarchyEntry, NewSource, Source, SourceFile, SourceListing, SourceNode, Thumbnail};
use crate::store::LibraryStore;
use crate::{Error, Result};

pub struct SourceService<S> {
    store: S,
}

impl<S: LibraryStore> SourceService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Import (or re-import) a source by URL. A non-empty `children` list
    /// replaces the source's child list.
    pub async fn import(&self, source: NewSource, children: &[SourceId]) -> Result<Source> {
        source.validate()?;
        let existing = self.store.find_source_by_url(&source.url).await?;
        let stored = self.store.upsert_source(&source).await?;

        if existing.is_some() {
            info!(source_id = %stored.id, url = %stored.url, "Refreshed source");
        } else {
            info!(source_id = %stored.id, url = %stored.url, "Imported source");
        }

        if !children.is_empty() {
            self.set_children(stored.id, children).await?;
        }
        Ok(stored)
    }

    /// Make `children` the ordered child list of `parent`, indexed from 0.
    /// A child that had another parent moves under `parent`.
    pub async fn set_children(&self, parent: SourceId, children: &[SourceId]) -> Result<()> {
        self.get(parent).await?;

        let mut seen = HashSet::with_capacity(children.len());
        for child in children {
            if *child == parent {
                return Err(Error::Validation(format!("source {} cannot be its own child", parent)));
            }
            if !seen.insert(*child) {
                return Err(Error::Validation(format!("source {} listed twice as a child", child)));
            }
            self.get(*child).await?;
        }

        // No child may be an ancestor of the parent
        let mut ancestor = self.store.parent_of(parent).await?;
        let mut visited = HashSet::new();
        while let Some(id) = ancestor {
            if seen.contains(&id) {
                return Err(Error::Validation(format!(
                    "linking {} under {} would create a cycle",
                    id, parent
                )));
            }
            if !visited.insert(id) {
                warn!(source_id = %id, "Stored hierarchy already contains a cycle");
                break;
            }
            ancestor = self.store.parent_of(id).await?;
        }

        self.store.replace_children(parent, children).await?;
        debug!(source_id = %parent, children = children.len(), "Replaced child list");
        Ok(())
    }

    pub async fn get(&self, id: SourceId) -> Result<Source> {
        self.store
            .get_source(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("source {}", id)))
    }

    /// Every source with its file descriptor, newest first
    pub async fn list(&self) -> Result<Vec<SourceListing>> {
        self.store.list_sources().await
    }

    /// Flat listing of `root` and all its descendants. Order across
    /// subtrees is unspecified; `list_index` orders siblings.
    pub async fn resolve_hierarchy(&self, root: SourceId) -> Result<Vec<HierarchyEntry>> {
        let entries = self.store.hierarchy_entries(root).await?;
        if entries.is_empty() {
            return Err(Error::NotFound(format!("source {}", root)));
        }
        Ok(entries)
    }

    /// Nested view of [`resolve_hierarchy`](Self::resolve_hierarchy)
    pub async fn hierarchy_tree(&self, root: SourceId) -> Result<SourceNode> {
        let entries = self.resolve_hierarchy(root).await?;
        let mut forest = build_forest(entries)?;
        match (forest.pop(), forest.is_empty()) {
            (Some(tree), true) if tree.id() == root => Ok(tree),
            _ => Err(Error::Internal(format!("hierarchy of {} does not form a single tree", root))),
        }
    }

    pub async fn attach_file(&self, source: SourceId, file: SourceFile) -> Result<()> {
        self.get(source).await?;
        if file.duration_ms.is_some_and(|d| d < 0) {
            return Err(Error::Validation("file duration must not be negative".to_string()));
        }
        self.store.put_source_file(source, &file).await?;
        info!(source_id = %source, codec = %file.codec, "Attached extracted file");
        Ok(())
    }

    /// `Ok(None)` when the source exists but has no extracted file
    pub async fn get_file(&self, source: SourceId) -> Result<Option<SourceFile>> {
        self.get(source).await?;
        self.store.get_source_file(source).await
    }

    /// Deleting an absent descriptor succeeds
    pub async fn delete_file(&self, source: SourceId) -> Result<()> {
        self.get(source).await?;
        if self.store.delete_source_file(source).await? {
            info!(source_id = %source, "Deleted extracted file descriptor");
        }
        Ok(())
    }

    pub async fn add_thumbnail(&self, deduplication_id: &str, file_path: &str, format: &str) -> Result<Thumbnail> {
        if deduplication_id.is_empty() {
            return Err(Error::Validation("thumbnail deduplication id must not be empty".to_string()));
        }
        self.store.insert_thumbnail(deduplication_id, file_path, format).await
    }

    /// Distinct thumbnails referenced by any of `sources`
    pub async fn search_thumbnails(&self, sources: &[SourceId]) -> Result<Vec<Thumbnail>> {
        if sources.is_empty() {
            return Ok(Vec::new());
        }
        self.store.thumbnails_for_sources(sources).await
    }

    /// Deletes the source with its file and tracks. Children become roots.
    pub async fn delete(&self, id: SourceId) -> Result<()> {
        if !self.store.delete_source(id).await? {
            return Err(Error::NotFound(format!("source {}", id)));
        }
        info!(source_id = %id, "Deleted source");
        Ok(())
    }
}
