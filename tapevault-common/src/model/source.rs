//! Source hierarchy model
//!
//! Sources form a forest: a playlist source has an ordered list of child
//! sources, a video source usually has none. Hierarchies travel as flat
//! lists of [`HierarchyEntry`] records and are rebuilt into [`SourceNode`]
//! trees on the consuming side.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::ids::{SourceId, ThumbnailId};
use crate::{Error, Result};

/// One imported external media item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub url: String,
    pub title: String,
    pub uploader: String,

    pub album_artist: String,
    pub album_title: String,
    pub album_index: i64,
    pub track_artist: String,
    pub track_title: String,
    /// Duration reported by the extractor at import time, 0 if unknown
    pub duration_ms: i64,

    pub release_date: Option<NaiveDate>,
    pub thumbnail_id: Option<ThumbnailId>,
    pub created_at: DateTime<Utc>,
}

/// Import payload for a source. Sources are keyed by URL, re-importing the
/// same URL refreshes the metadata of the existing source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSource {
    pub url: String,
    pub title: String,
    pub uploader: String,
    #[serde(default)]
    pub album_artist: String,
    #[serde(default)]
    pub album_title: String,
    #[serde(default)]
    pub album_index: i64,
    #[serde(default)]
    pub track_artist: String,
    #[serde(default)]
    pub track_title: String,
    #[serde(default)]
    pub duration_ms: i64,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub thumbnail_id: Option<ThumbnailId>,
}

impl NewSource {
    pub fn new(url: impl Into<String>, title: impl Into<String>, uploader: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            uploader: uploader.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::Validation("source url must not be empty".to_string()));
        }
        if self.duration_ms < 0 {
            return Err(Error::Validation(format!(
                "source duration must not be negative: {}",
                self.duration_ms
            )));
        }
        Ok(())
    }
}

/// Descriptor of the media file extracted for a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub codec: String,
    pub format: String,
    pub media_path: String,
    /// Length of the extracted media, once analyzed
    pub duration_ms: Option<i64>,
}

/// Source together with its optional extracted file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceListing {
    pub source: Source,
    pub file: Option<SourceFile>,
}

/// Flat hierarchy record, suitable for one-pass tree reconstruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyEntry {
    pub id: SourceId,
    pub parent_id: Option<SourceId>,
    /// Position among siblings, dense and zero-based
    pub list_index: i64,
    pub url: String,
    pub title: String,
    pub uploader: String,
    pub thumbnail_id: Option<ThumbnailId>,
}

/// Rebuilt hierarchy node, children ordered by `list_index`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceNode {
    pub entry: HierarchyEntry,
    pub children: Vec<SourceNode>,
}

impl SourceNode {
    pub fn id(&self) -> SourceId {
        self.entry.id
    }

    /// Ids of this node and all descendants, parents before children,
    /// siblings in list order
    pub fn preorder_ids(&self) -> Vec<SourceId> {
        let mut result = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            result.push(node.id());
            stack.extend(node.children.iter().rev());
        }
        result
    }
}

/// Rebuild a forest from flat entries.
///
/// Entries whose parent is not part of the listing become roots. Duplicate
/// ids, duplicate sibling indices and parent cycles are rejected.
pub fn build_forest(entries: Vec<HierarchyEntry>) -> Result<Vec<SourceNode>> {
    let mut by_id: HashMap<SourceId, HierarchyEntry> = HashMap::with_capacity(entries.len());
    for entry in entries {
        let id = entry.id;
        if by_id.insert(id, entry).is_some() {
            return Err(Error::Validation(format!("source {} listed twice in hierarchy", id)));
        }
    }

    let mut roots: Vec<(i64, SourceId)> = Vec::new();
    let mut children: HashMap<SourceId, Vec<(i64, SourceId)>> = HashMap::new();
    for entry in by_id.values() {
        match entry.parent_id.filter(|parent| by_id.contains_key(parent)) {
            Some(parent) => children.entry(parent).or_default().push((entry.list_index, entry.id)),
            None => roots.push((entry.list_index, entry.id)),
        }
    }

    roots.sort();
    for (parent, siblings) in children.iter_mut() {
        siblings.sort();
        if siblings.windows(2).any(|pair| pair[0].0 == pair[1].0) {
            return Err(Error::Validation(format!(
                "duplicate list index among children of {}",
                parent
            )));
        }
    }

    // Parents precede their children in `order`
    let mut order: Vec<SourceId> = Vec::with_capacity(by_id.len());
    let mut stack: Vec<SourceId> = roots.iter().rev().map(|(_, id)| *id).collect();
    let mut seen: HashSet<SourceId> = HashSet::with_capacity(by_id.len());
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        order.push(id);
        if let Some(siblings) = children.get(&id) {
            stack.extend(siblings.iter().rev().map(|(_, child)| *child));
        }
    }

    if order.len() != by_id.len() {
        return Err(Error::Validation(
            "source hierarchy contains a parent cycle".to_string(),
        ));
    }

    let mut built: HashMap<SourceId, SourceNode> = HashMap::with_capacity(order.len());
    for id in order.iter().rev() {
        let Some(entry) = by_id.remove(id) else { continue };
        let child_nodes = children
            .get(id)
            .map(|siblings| {
                siblings
                    .iter()
                    .filter_map(|(_, child)| built.remove(child))
                    .collect()
            })
            .unwrap_or_default();
        built.insert(*id, SourceNode { entry, children: child_nodes });
    }

    Ok(roots.iter().filter_map(|(_, id)| built.remove(id)).collect())
}

/// Flatten a forest into entries. Children get their parent's id and their
/// position as `list_index`; roots keep the values they carry.
pub fn flatten(forest: &[SourceNode]) -> Vec<HierarchyEntry> {
    let mut result = Vec::new();
    let mut stack: Vec<(&SourceNode, Option<(SourceId, i64)>)> =
        forest.iter().rev().map(|node| (node, None)).collect();

    while let Some((node, placement)) = stack.pop() {
        let mut entry = node.entry.clone();
        if let Some((parent_id, list_index)) = placement {
            entry.parent_id = Some(parent_id);
            entry.list_index = list_index;
        }
        result.push(entry);

        for (index, child) in node.children.iter().enumerate().rev() {
            stack.push((child, Some((node.id(), index as i64))));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: SourceId, parent_id: Option<SourceId>, list_index: i64, title: &str) -> HierarchyEntry {
        HierarchyEntry {
            id,
            parent_id,
            list_index,
            url: format!("https://example.com/{}", title),
            title: title.to_string(),
            uploader: "uploader".to_string(),
            thumbnail_id: None,
        }
    }

    fn leaf(entry: HierarchyEntry) -> SourceNode {
        SourceNode { entry, children: Vec::new() }
    }

    #[test]
    fn test_build_orders_children_by_list_index() {
        let root = SourceId::new();
        let first = SourceId::new();
        let second = SourceId::new();
        let entries = vec![
            entry(second, Some(root), 1, "second"),
            entry(root, None, 0, "root"),
            entry(first, Some(root), 0, "first"),
        ];

        let forest = build_forest(entries).unwrap();

        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id(), root);
        let titles: Vec<_> = forest[0].children.iter().map(|c| c.entry.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[test]
    fn test_flatten_then_build_is_isomorphic() {
        let root = SourceId::new();
        let season = SourceId::new();
        let forest = vec![SourceNode {
            entry: entry(root, None, 0, "playlist"),
            children: vec![
                leaf(entry(SourceId::new(), Some(root), 0, "intro")),
                SourceNode {
                    entry: entry(season, Some(root), 1, "season"),
                    children: vec![
                        leaf(entry(SourceId::new(), Some(season), 0, "ep1")),
                        leaf(entry(SourceId::new(), Some(season), 1, "ep2")),
                    ],
                },
                leaf(entry(SourceId::new(), Some(root), 2, "outro")),
            ],
        }];

        let flat = flatten(&forest);
        assert_eq!(flat.len(), 6);
        assert_eq!(build_forest(flat).unwrap(), forest);
    }

    #[test]
    fn test_entries_with_unlisted_parent_become_roots() {
        let outside = SourceId::new();
        let subtree = SourceId::new();
        let forest = build_forest(vec![
            entry(subtree, Some(outside), 3, "subtree"),
            entry(SourceId::new(), Some(subtree), 0, "child"),
        ])
        .unwrap();

        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id(), subtree);
        assert_eq!(forest[0].entry.parent_id, Some(outside));
        assert_eq!(forest[0].children.len(), 1);
    }

    #[test]
    fn test_rejects_cycles() {
        let a = SourceId::new();
        let b = SourceId::new();
        let result = build_forest(vec![entry(a, Some(b), 0, "a"), entry(b, Some(a), 0, "b")]);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_rejects_duplicate_sibling_index() {
        let root = SourceId::new();
        let result = build_forest(vec![
            entry(root, None, 0, "root"),
            entry(SourceId::new(), Some(root), 0, "x"),
            entry(SourceId::new(), Some(root), 0, "y"),
        ]);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_preorder_handles_deep_chains() {
        let mut entries = Vec::new();
        let mut parent = None;
        let mut ids = Vec::new();
        for depth in 0..2_000 {
            let id = SourceId::new();
            entries.push(entry(id, parent, 0, &format!("level{}", depth)));
            ids.push(id);
            parent = Some(id);
        }

        let forest = build_forest(entries).unwrap();
        assert_eq!(forest[0].preorder_ids(), ids);
        assert_eq!(flatten(&forest).len(), 2_000);
    }

    #[test]
    fn test_new_source_requires_url() {
        assert!(NewSource::new(" ", "t", "u").validate().is_err());
        assert!(NewSource::new("https://example.com/v", "t", "u").validate().is_ok());
    }
}
