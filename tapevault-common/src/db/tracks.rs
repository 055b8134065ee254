//! Track queries

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{id_list, optional_id};
use crate::guess::GuessInput;
use crate::ids::{parse_column, SourceId, TrackId};
use crate::model::{Boundary, Track};
use crate::Result;

const TRACK_COLUMNS: &str = "tracks.guid, tracks.source_id, tracks.artist, tracks.title, \
     tracks.raw_start_offset_ms, tracks.start_offset_ms, tracks.raw_end_offset_ms, tracks.end_offset_ms";

const TRACK_ORDER: &str = "tracks.source_id, \
     COALESCE(tracks.start_offset_ms, tracks.raw_start_offset_ms), \
     COALESCE(tracks.end_offset_ms, tracks.raw_end_offset_ms), tracks.guid";

fn track_from_row(row: &SqliteRow) -> Result<Track> {
    Ok(Track {
        id: parse_column(&row.try_get::<String, _>("guid")?)?,
        source_id: parse_column(&row.try_get::<String, _>("source_id")?)?,
        artist: row.try_get("artist")?,
        title: row.try_get("title")?,
        start: Boundary {
            raw_ms: row.try_get("raw_start_offset_ms")?,
            effective_ms: row.try_get("start_offset_ms")?,
        },
        end: Boundary {
            raw_ms: row.try_get("raw_end_offset_ms")?,
            effective_ms: row.try_get("end_offset_ms")?,
        },
    })
}

/// Tracks of the given sources, grouped by source and ordered by effective start
pub async fn tracks_by_sources(pool: &SqlitePool, sources: &[SourceId]) -> Result<Vec<Track>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM tracks WHERE tracks.source_id IN (SELECT value FROM json_each(?)) ORDER BY {}",
        TRACK_COLUMNS, TRACK_ORDER
    ))
    .bind(id_list(sources)?)
    .fetch_all(pool)
    .await?;

    rows.iter().map(track_from_row).collect()
}

pub async fn tracks_by_ids(pool: &SqlitePool, ids: &[TrackId]) -> Result<Vec<Track>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM tracks WHERE tracks.guid IN (SELECT value FROM json_each(?)) ORDER BY {}",
        TRACK_COLUMNS, TRACK_ORDER
    ))
    .bind(id_list(ids)?)
    .fetch_all(pool)
    .await?;

    rows.iter().map(track_from_row).collect()
}

/// Upsert every listed track and drop the source's tracks that are not
/// listed, in one transaction. Composition references to dropped tracks
/// are left in place.
pub async fn replace_source_tracks(pool: &SqlitePool, source: SourceId, tracks: &[Track]) -> Result<()> {
    let mut tx = pool.begin().await?;

    for track in tracks {
        sqlx::query(
            r#"
            INSERT INTO tracks (
                guid, source_id, artist, title,
                raw_start_offset_ms, start_offset_ms, raw_end_offset_ms, end_offset_ms
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(guid) DO UPDATE SET
                artist = excluded.artist,
                title = excluded.title,
                raw_start_offset_ms = excluded.raw_start_offset_ms,
                start_offset_ms = excluded.start_offset_ms,
                raw_end_offset_ms = excluded.raw_end_offset_ms,
                end_offset_ms = excluded.end_offset_ms
            WHERE tracks.source_id = excluded.source_id
            "#,
        )
        .bind(track.id.to_string())
        .bind(source.to_string())
        .bind(&track.artist)
        .bind(&track.title)
        .bind(track.start.raw_ms)
        .bind(track.start.effective_ms)
        .bind(track.end.raw_ms)
        .bind(track.end.effective_ms)
        .execute(&mut *tx)
        .await?;
    }

    let keep: Vec<TrackId> = tracks.iter().map(|t| t.id).collect();
    sqlx::query(
        r#"
        DELETE FROM tracks
        WHERE source_id = ?
          AND guid NOT IN (SELECT value FROM json_each(?))
        "#,
    )
    .bind(source.to_string())
    .bind(id_list(&keep)?)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Tracks where every term is a prefix of some word of the artist or
/// title, compared case-insensitively
pub async fn search_tracks(pool: &SqlitePool, terms: &[String]) -> Result<Vec<Track>> {
    if terms.is_empty() {
        return Ok(Vec::new());
    }

    let conditions = vec![
        r"(' ' || lower(tracks.artist) || ' ' || lower(tracks.title)) LIKE ? ESCAPE '\'";
        terms.len()
    ];
    let sql = format!(
        "SELECT {} FROM tracks WHERE {} ORDER BY {}",
        TRACK_COLUMNS,
        conditions.join(" AND "),
        TRACK_ORDER
    );

    let mut query = sqlx::query(&sql);
    for term in terms {
        query = query.bind(format!("% {}%", escape_like(&term.to_lowercase())));
    }
    let rows = query.fetch_all(pool).await?;

    rows.iter().map(track_from_row).collect()
}

/// Track, source and parent-source facts for metadata guessing. Unknown
/// ids are skipped.
pub async fn guess_inputs(pool: &SqlitePool, ids: &[TrackId]) -> Result<Vec<GuessInput>> {
    let rows = sqlx::query(
        r#"
        SELECT
            tracks.guid AS track_id,
            tracks.artist AS artist,
            sources.title AS source_title,
            sources.album_artist AS album_artist,
            sources.album_title AS album_title,
            sources.release_date AS release_date,
            sources.thumbnail_id AS thumbnail_id,
            parents.title AS parent_title
        FROM tracks
        JOIN sources ON sources.guid = tracks.source_id
        LEFT JOIN source_hierarchy ON source_hierarchy.child_id = sources.guid
        LEFT JOIN sources AS parents ON parents.guid = source_hierarchy.parent_id
        WHERE tracks.guid IN (SELECT value FROM json_each(?))
        "#,
    )
    .bind(id_list(ids)?)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let parent_title: Option<String> = row.try_get("parent_title")?;
            Ok(GuessInput {
                track_id: parse_column(&row.try_get::<String, _>("track_id")?)?,
                artist: row.try_get("artist")?,
                source_title: row.try_get("source_title")?,
                source_parent_titles: parent_title.into_iter().collect(),
                album_artist: row.try_get("album_artist")?,
                album_title: row.try_get("album_title")?,
                release_date: row.try_get("release_date")?,
                thumbnail_id: optional_id(row.try_get("thumbnail_id")?)?,
            })
        })
        .collect()
}
