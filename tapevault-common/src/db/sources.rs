//! Source, hierarchy, file and thumbnail queries

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use super::{id_list, optional_id};
use crate::ids::{parse_column, SourceId, ThumbnailId};
use crate::model::{HierarchyEntry, NewSource, Source, SourceFile, SourceListing, Thumbnail};
use crate::Result;

const SOURCE_FIELDS: [&str; 13] = [
    "guid",
    "url",
    "title",
    "uploader",
    "album_artist",
    "album_title",
    "album_index",
    "track_artist",
    "track_title",
    "duration_ms",
    "release_date",
    "thumbnail_id",
    "created_at",
];

/// Column list for source rows, optionally table-qualified for joins
fn source_columns(table: Option<&str>) -> String {
    SOURCE_FIELDS
        .iter()
        .map(|field| match table {
            Some(table) => format!("{}.{}", table, field),
            None => field.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn source_from_row(row: &SqliteRow) -> Result<Source> {
    Ok(Source {
        id: parse_column(&row.try_get::<String, _>("guid")?)?,
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        uploader: row.try_get("uploader")?,
        album_artist: row.try_get("album_artist")?,
        album_title: row.try_get("album_title")?,
        album_index: row.try_get("album_index")?,
        track_artist: row.try_get("track_artist")?,
        track_title: row.try_get("track_title")?,
        duration_ms: row.try_get("duration_ms")?,
        release_date: row.try_get("release_date")?,
        thumbnail_id: optional_id(row.try_get("thumbnail_id")?)?,
        created_at: row.try_get("created_at")?,
    })
}

fn file_from_row(row: &SqliteRow) -> Result<Option<SourceFile>> {
    let codec: Option<String> = row.try_get("codec")?;
    let Some(codec) = codec else {
        return Ok(None);
    };
    Ok(Some(SourceFile {
        codec,
        format: row.try_get("format")?,
        media_path: row.try_get("media_path")?,
        duration_ms: row.try_get("file_duration_ms")?,
    }))
}

/// Insert, or refresh metadata of the source already stored under the URL.
/// The id and creation time of an existing source are kept.
pub async fn upsert_source(pool: &SqlitePool, source: &NewSource) -> Result<Source> {
    let now = Utc::now();
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO sources (
            guid, url, title, uploader,
            album_artist, album_title, album_index, track_artist, track_title,
            duration_ms, release_date, thumbnail_id, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(url) DO UPDATE SET
            title = excluded.title,
            uploader = excluded.uploader,
            album_artist = excluded.album_artist,
            album_title = excluded.album_title,
            album_index = excluded.album_index,
            track_artist = excluded.track_artist,
            track_title = excluded.track_title,
            duration_ms = excluded.duration_ms,
            release_date = excluded.release_date,
            thumbnail_id = excluded.thumbnail_id,
            updated_at = excluded.updated_at
        RETURNING {}
        "#,
        source_columns(None)
    ))
    .bind(SourceId::new().to_string())
    .bind(&source.url)
    .bind(&source.title)
    .bind(&source.uploader)
    .bind(&source.album_artist)
    .bind(&source.album_title)
    .bind(source.album_index)
    .bind(&source.track_artist)
    .bind(&source.track_title)
    .bind(source.duration_ms)
    .bind(source.release_date)
    .bind(source.thumbnail_id.map(|id| id.to_string()))
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    source_from_row(&row)
}

pub async fn get_source(pool: &SqlitePool, id: SourceId) -> Result<Option<Source>> {
    let row = sqlx::query(&format!("SELECT {} FROM sources WHERE guid = ?", source_columns(None)))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(source_from_row).transpose()
}

pub async fn find_source_by_url(pool: &SqlitePool, url: &str) -> Result<Option<Source>> {
    let row = sqlx::query(&format!("SELECT {} FROM sources WHERE url = ?", source_columns(None)))
        .bind(url)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(source_from_row).transpose()
}

/// Every source with its file descriptor, newest first
pub async fn list_sources(pool: &SqlitePool) -> Result<Vec<SourceListing>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {},
            source_files.codec, source_files.format, source_files.media_path,
            source_files.duration_ms AS file_duration_ms
        FROM sources
        LEFT JOIN source_files ON source_files.source_id = sources.guid
        ORDER BY sources.created_at DESC, sources.album_index DESC, sources.guid DESC
        "#,
        source_columns(Some("sources"))
    ))
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(SourceListing {
                source: source_from_row(row)?,
                file: file_from_row(row)?,
            })
        })
        .collect()
}

/// The deleted source's former siblings are re-indexed from 0
pub async fn delete_source(pool: &SqlitePool, id: SourceId) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let parent: Option<String> =
        sqlx::query_scalar("SELECT parent_id FROM source_hierarchy WHERE child_id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?;

    let result = sqlx::query("DELETE FROM sources WHERE guid = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    if let Some(parent) = parent {
        redensify_children(&mut tx, &parent).await?;
    }

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

pub async fn parent_of(pool: &SqlitePool, id: SourceId) -> Result<Option<SourceId>> {
    let parent: Option<String> =
        sqlx::query_scalar("SELECT parent_id FROM source_hierarchy WHERE child_id = ?")
            .bind(id.to_string())
            .fetch_optional(pool)
            .await?;

    optional_id(parent)
}

/// Number `parent`'s children 0, 1, 2... keeping their relative order.
/// Indices go negative first so no step collides with `UNIQUE (parent_id, list_index)`.
async fn redensify_children(tx: &mut Transaction<'_, Sqlite>, parent: &str) -> Result<()> {
    let children: Vec<String> = sqlx::query_scalar(
        "SELECT child_id FROM source_hierarchy WHERE parent_id = ? ORDER BY list_index",
    )
    .bind(parent)
    .fetch_all(&mut **tx)
    .await?;

    sqlx::query("UPDATE source_hierarchy SET list_index = -1 - list_index WHERE parent_id = ?")
        .bind(parent)
        .execute(&mut **tx)
        .await?;

    for (index, child) in children.iter().enumerate() {
        sqlx::query("UPDATE source_hierarchy SET list_index = ? WHERE child_id = ?")
            .bind(index as i64)
            .bind(child)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// Rewrite `parent`'s child list with dense indices from 0. Children taken
/// from another parent leave that parent's list dense as well.
pub async fn replace_children(pool: &SqlitePool, parent: SourceId, children: &[SourceId]) -> Result<()> {
    let mut tx = pool.begin().await?;

    let previous_parents: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT parent_id
        FROM source_hierarchy
        WHERE child_id IN (SELECT value FROM json_each(?))
          AND parent_id <> ?
        "#,
    )
    .bind(id_list(children)?)
    .bind(parent.to_string())
    .fetch_all(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM source_hierarchy WHERE parent_id = ?")
        .bind(parent.to_string())
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM source_hierarchy WHERE child_id IN (SELECT value FROM json_each(?))")
        .bind(id_list(children)?)
        .execute(&mut *tx)
        .await?;

    for previous in &previous_parents {
        redensify_children(&mut tx, previous).await?;
    }

    for (index, child) in children.iter().enumerate() {
        sqlx::query("INSERT INTO source_hierarchy (child_id, parent_id, list_index) VALUES (?, ?, ?)")
            .bind(child.to_string())
            .bind(parent.to_string())
            .bind(index as i64)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// `root` plus all descendants. `UNION` (not `UNION ALL`) keeps the
/// recursion finite even if the stored links were ever cyclic.
pub async fn hierarchy_entries(pool: &SqlitePool, root: SourceId) -> Result<Vec<HierarchyEntry>> {
    let rows = sqlx::query(
        r#"
        WITH RECURSIVE subtree (id) AS (
            SELECT ?
            UNION
            SELECT source_hierarchy.child_id
            FROM source_hierarchy
            JOIN subtree ON source_hierarchy.parent_id = subtree.id
        )
        SELECT
            sources.guid AS guid,
            source_hierarchy.parent_id AS parent_id,
            COALESCE(source_hierarchy.list_index, 0) AS list_index,
            sources.url AS url,
            sources.title AS title,
            sources.uploader AS uploader,
            sources.thumbnail_id AS thumbnail_id
        FROM sources
        JOIN subtree ON sources.guid = subtree.id
        LEFT JOIN source_hierarchy ON source_hierarchy.child_id = sources.guid
        "#,
    )
    .bind(root.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(HierarchyEntry {
                id: parse_column(&row.try_get::<String, _>("guid")?)?,
                parent_id: optional_id(row.try_get("parent_id")?)?,
                list_index: row.try_get("list_index")?,
                url: row.try_get("url")?,
                title: row.try_get("title")?,
                uploader: row.try_get("uploader")?,
                thumbnail_id: optional_id(row.try_get("thumbnail_id")?)?,
            })
        })
        .collect()
}

pub async fn get_source_file(pool: &SqlitePool, source: SourceId) -> Result<Option<SourceFile>> {
    let row = sqlx::query(
        r#"
        SELECT codec, format, media_path, duration_ms AS file_duration_ms
        FROM source_files
        WHERE source_id = ?
        "#,
    )
    .bind(source.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => file_from_row(&row),
        None => Ok(None),
    }
}

pub async fn put_source_file(pool: &SqlitePool, source: SourceId, file: &SourceFile) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO source_files (source_id, codec, format, media_path, duration_ms)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(source_id) DO UPDATE SET
            codec = excluded.codec,
            format = excluded.format,
            media_path = excluded.media_path,
            duration_ms = excluded.duration_ms
        "#,
    )
    .bind(source.to_string())
    .bind(&file.codec)
    .bind(&file.format)
    .bind(&file.media_path)
    .bind(file.duration_ms)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_source_file(pool: &SqlitePool, source: SourceId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM source_files WHERE source_id = ?")
        .bind(source.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn thumbnail_from_row(row: &SqliteRow) -> Result<Thumbnail> {
    Ok(Thumbnail {
        id: parse_column::<ThumbnailId>(&row.try_get::<String, _>("guid")?)?,
        file_path: row.try_get("file_path")?,
        format: row.try_get("format")?,
    })
}

/// Thumbnails are deduplicated by an extractor-provided key
pub async fn insert_thumbnail(
    pool: &SqlitePool,
    deduplication_id: &str,
    file_path: &str,
    format: &str,
) -> Result<Thumbnail> {
    let row = sqlx::query(
        r#"
        INSERT INTO thumbnails (guid, deduplication_id, file_path, format)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(deduplication_id) DO UPDATE SET
            file_path = excluded.file_path,
            format = excluded.format
        RETURNING guid, file_path, format
        "#,
    )
    .bind(ThumbnailId::new().to_string())
    .bind(deduplication_id)
    .bind(file_path)
    .bind(format)
    .fetch_one(pool)
    .await?;

    thumbnail_from_row(&row)
}

pub async fn thumbnails_for_sources(pool: &SqlitePool, sources: &[SourceId]) -> Result<Vec<Thumbnail>> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT thumbnails.guid, thumbnails.file_path, thumbnails.format
        FROM thumbnails
        JOIN sources ON sources.thumbnail_id = thumbnails.guid
        WHERE sources.guid IN (SELECT value FROM json_each(?))
        ORDER BY thumbnails.guid
        "#,
    )
    .bind(id_list(sources)?)
    .fetch_all(pool)
    .await?;

    rows.iter().map(thumbnail_from_row).collect()
}
