//! Source import, hierarchy and file descriptor behaviour against SQLite

mod helpers;

use helpers::{create_test_store, get_table_names, import_source, import_with_file, seed_tracks};
use tapevault_common::db::SqliteStore;
use tapevault_common::ids::SourceId;
use tapevault_common::model::source::{build_forest, flatten};
use tapevault_common::model::{NewSource, SourceFile};
use tapevault_common::services::{SourceService, TrackService};
use tapevault_common::{Error, LibraryStore};

#[tokio::test]
async fn test_schema_is_created() {
    let (_dir, store) = create_test_store().await.unwrap();
    let tables = get_table_names(store.pool()).await.unwrap();

    for table in [
        "composition_tracks",
        "compositions",
        "schema_version",
        "scrobble_sessions",
        "source_files",
        "source_hierarchy",
        "sources",
        "thumbnails",
        "tracks",
    ] {
        assert!(tables.contains(&table.to_string()), "missing table {}", table);
    }
}

#[tokio::test]
async fn test_reimport_refreshes_metadata_and_keeps_id() {
    let (_dir, store) = create_test_store().await.unwrap();
    let service = SourceService::new(store.clone());

    let first = service
        .import(NewSource::new("https://example.com/v/1", "Old title", "someone"), &[])
        .await
        .unwrap();
    let second = service
        .import(NewSource::new("https://example.com/v/1", "New title", "someone"), &[])
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.title, "New title");
    assert_eq!(service.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_import_rejects_empty_url() {
    let (_dir, store) = create_test_store().await.unwrap();
    let service = SourceService::new(store);
    let result = service.import(NewSource::new("  ", "t", "u"), &[]).await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn test_hierarchy_lists_root_and_descendants() {
    let (_dir, store) = create_test_store().await.unwrap();
    let service = SourceService::new(store.clone());

    let playlist = import_source(&store, "https://example.com/list", "Playlist").await.unwrap();
    let a = import_source(&store, "https://example.com/a", "A").await.unwrap();
    let b = import_source(&store, "https://example.com/b", "B").await.unwrap();
    let b1 = import_source(&store, "https://example.com/b1", "B1").await.unwrap();
    let unrelated = import_source(&store, "https://example.com/x", "X").await.unwrap();

    service.set_children(playlist.id, &[b.id, a.id]).await.unwrap();
    service.set_children(b.id, &[b1.id]).await.unwrap();

    let entries = service.resolve_hierarchy(playlist.id).await.unwrap();
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|e| e.id != unrelated.id));

    let index_of = |id: SourceId| entries.iter().find(|e| e.id == id).unwrap();
    assert_eq!(index_of(b.id).list_index, 0);
    assert_eq!(index_of(b.id).parent_id, Some(playlist.id));
    assert_eq!(index_of(a.id).list_index, 1);
    assert_eq!(index_of(b1.id).parent_id, Some(b.id));
    assert_eq!(index_of(playlist.id).parent_id, None);

    let tree = service.hierarchy_tree(playlist.id).await.unwrap();
    assert_eq!(tree.preorder_ids(), vec![playlist.id, b.id, b1.id, a.id]);

    // Flat listing and nested tree describe the same structure
    let rebuilt = build_forest(flatten(std::slice::from_ref(&tree))).unwrap();
    assert_eq!(rebuilt, vec![tree]);
}

#[tokio::test]
async fn test_subtree_hierarchy_keeps_outer_parent_link() {
    let (_dir, store) = create_test_store().await.unwrap();
    let service = SourceService::new(store.clone());

    let root = import_source(&store, "https://example.com/root", "Root").await.unwrap();
    let mid = import_source(&store, "https://example.com/mid", "Mid").await.unwrap();
    let leaf = import_source(&store, "https://example.com/leaf", "Leaf").await.unwrap();
    service.set_children(root.id, &[mid.id]).await.unwrap();
    service.set_children(mid.id, &[leaf.id]).await.unwrap();

    let entries = service.resolve_hierarchy(mid.id).await.unwrap();
    assert_eq!(entries.len(), 2);

    let tree = service.hierarchy_tree(mid.id).await.unwrap();
    assert_eq!(tree.id(), mid.id);
    assert_eq!(tree.entry.parent_id, Some(root.id));
    assert_eq!(tree.preorder_ids(), vec![mid.id, leaf.id]);
}

#[tokio::test]
async fn test_unknown_root_is_not_found() {
    let (_dir, store) = create_test_store().await.unwrap();
    let service = SourceService::new(store);
    let result = service.resolve_hierarchy(SourceId::new()).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_set_children_rejects_cycles_and_duplicates() {
    let (_dir, store) = create_test_store().await.unwrap();
    let service = SourceService::new(store.clone());

    let a = import_source(&store, "https://example.com/a", "A").await.unwrap();
    let b = import_source(&store, "https://example.com/b", "B").await.unwrap();
    let c = import_source(&store, "https://example.com/c", "C").await.unwrap();
    service.set_children(a.id, &[b.id]).await.unwrap();
    service.set_children(b.id, &[c.id]).await.unwrap();

    assert!(matches!(service.set_children(c.id, &[a.id]).await, Err(Error::Validation(_))));
    assert!(matches!(service.set_children(a.id, &[a.id]).await, Err(Error::Validation(_))));
    assert!(matches!(
        service.set_children(a.id, &[b.id, b.id]).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        service.set_children(a.id, &[SourceId::new()]).await,
        Err(Error::NotFound(_))
    ));

    // Rejected calls left the tree alone
    let tree = service.hierarchy_tree(a.id).await.unwrap();
    assert_eq!(tree.preorder_ids(), vec![a.id, b.id, c.id]);
}

/// List indices of `parent`'s direct children, in list order
async fn child_indices(service: &SourceService<SqliteStore>, parent: SourceId) -> Vec<(SourceId, i64)> {
    let mut children: Vec<(SourceId, i64)> = service
        .resolve_hierarchy(parent)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.parent_id == Some(parent))
        .map(|e| (e.id, e.list_index))
        .collect();
    children.sort_by_key(|(_, index)| *index);
    children
}

#[tokio::test]
async fn test_moving_a_child_redensifies_old_parent() {
    let (_dir, store) = create_test_store().await.unwrap();
    let service = SourceService::new(store.clone());

    let p1 = import_source(&store, "https://example.com/p1", "P1").await.unwrap();
    let p2 = import_source(&store, "https://example.com/p2", "P2").await.unwrap();
    let x = import_source(&store, "https://example.com/x", "X").await.unwrap();
    let y = import_source(&store, "https://example.com/y", "Y").await.unwrap();
    let z = import_source(&store, "https://example.com/z", "Z").await.unwrap();

    service.set_children(p1.id, &[x.id, y.id, z.id]).await.unwrap();
    service.set_children(p2.id, &[x.id]).await.unwrap();

    assert_eq!(store.parent_of(x.id).await.unwrap(), Some(p2.id));
    assert_eq!(child_indices(&service, p1.id).await, vec![(y.id, 0), (z.id, 1)]);
    assert_eq!(child_indices(&service, p2.id).await, vec![(x.id, 0)]);

    // Taking the middle child keeps the remaining order
    service.set_children(p2.id, &[x.id, y.id]).await.unwrap();
    assert_eq!(child_indices(&service, p1.id).await, vec![(z.id, 0)]);
    assert_eq!(child_indices(&service, p2.id).await, vec![(x.id, 0), (y.id, 1)]);
}

#[tokio::test]
async fn test_deleting_a_child_redensifies_siblings() {
    let (_dir, store) = create_test_store().await.unwrap();
    let service = SourceService::new(store.clone());

    let parent = import_source(&store, "https://example.com/p", "P").await.unwrap();
    let a = import_source(&store, "https://example.com/a", "A").await.unwrap();
    let b = import_source(&store, "https://example.com/b", "B").await.unwrap();
    let c = import_source(&store, "https://example.com/c", "C").await.unwrap();
    service.set_children(parent.id, &[a.id, b.id, c.id]).await.unwrap();

    service.delete(b.id).await.unwrap();
    assert_eq!(child_indices(&service, parent.id).await, vec![(a.id, 0), (c.id, 1)]);

    service.delete(a.id).await.unwrap();
    assert_eq!(child_indices(&service, parent.id).await, vec![(c.id, 0)]);

    let tree = service.hierarchy_tree(parent.id).await.unwrap();
    assert_eq!(tree.preorder_ids(), vec![parent.id, c.id]);
}

#[tokio::test]
async fn test_import_with_children_links_them() {
    let (_dir, store) = create_test_store().await.unwrap();
    let service = SourceService::new(store.clone());

    let a = import_source(&store, "https://example.com/a", "A").await.unwrap();
    let b = import_source(&store, "https://example.com/b", "B").await.unwrap();
    let list = service
        .import(NewSource::new("https://example.com/list", "List", "u"), &[a.id, b.id])
        .await
        .unwrap();

    let tree = service.hierarchy_tree(list.id).await.unwrap();
    assert_eq!(tree.preorder_ids(), vec![list.id, a.id, b.id]);
}

#[tokio::test]
async fn test_file_descriptor_lifecycle() {
    let (_dir, store) = create_test_store().await.unwrap();
    let service = SourceService::new(store.clone());
    let source = import_source(&store, "https://example.com/v", "V").await.unwrap();

    assert_eq!(service.get_file(source.id).await.unwrap(), None);

    let file = SourceFile {
        codec: "opus".to_string(),
        format: "webm".to_string(),
        media_path: "v.webm".to_string(),
        duration_ms: Some(180_000),
    };
    service.attach_file(source.id, file.clone()).await.unwrap();
    assert_eq!(service.get_file(source.id).await.unwrap(), Some(file.clone()));

    let listing = service.list().await.unwrap();
    assert_eq!(listing[0].file, Some(file));

    service.delete_file(source.id).await.unwrap();
    service.delete_file(source.id).await.unwrap();
    assert_eq!(service.get_file(source.id).await.unwrap(), None);

    assert!(matches!(service.get_file(SourceId::new()).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_delete_source_cascades_to_file_and_tracks() {
    let (_dir, store) = create_test_store().await.unwrap();
    let service = SourceService::new(store.clone());

    let parent = import_source(&store, "https://example.com/p", "P").await.unwrap();
    let source = import_with_file(&store, "https://example.com/v", "V", 300_000).await.unwrap();
    let child = import_source(&store, "https://example.com/c", "C").await.unwrap();
    service.set_children(parent.id, &[source.id]).await.unwrap();
    service.set_children(source.id, &[child.id]).await.unwrap();
    seed_tracks(&store, source.id, &["one", "two"]).await.unwrap();

    service.delete(source.id).await.unwrap();

    assert!(matches!(service.get(source.id).await, Err(Error::NotFound(_))));
    assert!(store.tracks_by_sources(&[source.id]).await.unwrap().is_empty());
    assert_eq!(store.get_source_file(source.id).await.unwrap(), None);
    assert_eq!(store.parent_of(child.id).await.unwrap(), None);
    assert_eq!(service.resolve_hierarchy(parent.id).await.unwrap().len(), 1);
    assert!(matches!(service.delete(source.id).await, Err(Error::NotFound(_))));

    let tracks = TrackService::new(store.clone());
    assert!(matches!(tracks.list_tracks(source.id, false).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_search_thumbnails_deduplicates() {
    let (_dir, store) = create_test_store().await.unwrap();
    let service = SourceService::new(store.clone());

    let thumb = service.add_thumbnail("yt:abc", "thumbs/abc.jpg", "jpg").await.unwrap();
    let again = service.add_thumbnail("yt:abc", "thumbs/abc.webp", "webp").await.unwrap();
    assert_eq!(thumb.id, again.id);

    let mut a = NewSource::new("https://example.com/a", "A", "u");
    a.thumbnail_id = Some(thumb.id);
    let mut b = NewSource::new("https://example.com/b", "B", "u");
    b.thumbnail_id = Some(thumb.id);
    let a = service.import(a, &[]).await.unwrap();
    let b = service.import(b, &[]).await.unwrap();
    let c = import_source(&store, "https://example.com/c", "C").await.unwrap();

    let found = service.search_thumbnails(&[a.id, b.id, c.id]).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].format, "webp");
    assert!(service.search_thumbnails(&[c.id]).await.unwrap().is_empty());
    assert!(service.search_thumbnails(&[]).await.unwrap().is_empty());
}
