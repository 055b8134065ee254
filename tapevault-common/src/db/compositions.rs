//! Composition (tape, playlist, album) queries

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use super::{id_list, optional_id};
use crate::ids::{parse_column, CompositionId, TrackId, TrackRefId};
use crate::model::{Composition, CompositionKind, CompositionSummary, TrackRef, TrackSnapshot};
use crate::Result;

const SUMMARY_COLUMNS: &str = "compositions.guid, compositions.name, compositions.kind, \
     compositions.artist, compositions.released_at, compositions.thumbnail_id, compositions.created_at";

fn summary_from_row(row: &SqliteRow) -> Result<CompositionSummary> {
    Ok(CompositionSummary {
        id: parse_column(&row.try_get::<String, _>("guid")?)?,
        name: row.try_get("name")?,
        kind: row.try_get::<String, _>("kind")?.parse::<CompositionKind>()?,
        artist: row.try_get("artist")?,
        released_at: row.try_get("released_at")?,
        thumbnail_id: optional_id(row.try_get("thumbnail_id")?)?,
        created_at: row.try_get("created_at")?,
    })
}

async fn insert_references(tx: &mut Transaction<'_, Sqlite>, composition: &Composition) -> Result<()> {
    for (index, reference) in composition.tracks.iter().enumerate() {
        sqlx::query(
            "INSERT INTO composition_tracks (guid, composition_id, track_id, list_index) VALUES (?, ?, ?, ?)",
        )
        .bind(reference.id.to_string())
        .bind(composition.id.to_string())
        .bind(reference.track_id.to_string())
        .bind(index as i64)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

pub async fn insert_composition(pool: &SqlitePool, composition: &Composition) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO compositions (
            guid, name, kind, artist, released_at, thumbnail_id, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(composition.id.to_string())
    .bind(&composition.name)
    .bind(composition.kind.as_str())
    .bind(&composition.artist)
    .bind(composition.released_at)
    .bind(composition.thumbnail_id.map(|id| id.to_string()))
    .bind(composition.created_at)
    .bind(composition.created_at)
    .execute(&mut *tx)
    .await?;

    insert_references(&mut tx, composition).await?;

    tx.commit().await?;
    Ok(())
}

/// Replace metadata and the whole reference list. Reference ids are
/// reinserted as given, so retained references keep their identity.
pub async fn update_composition(pool: &SqlitePool, composition: &Composition) -> Result<()> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        UPDATE compositions
        SET name = ?, kind = ?, artist = ?, released_at = ?, thumbnail_id = ?, updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(&composition.name)
    .bind(composition.kind.as_str())
    .bind(&composition.artist)
    .bind(composition.released_at)
    .bind(composition.thumbnail_id.map(|id| id.to_string()))
    .bind(Utc::now())
    .bind(composition.id.to_string())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound.into());
    }

    sqlx::query("DELETE FROM composition_tracks WHERE composition_id = ?")
        .bind(composition.id.to_string())
        .execute(&mut *tx)
        .await?;

    insert_references(&mut tx, composition).await?;

    tx.commit().await?;
    Ok(())
}

/// Composition with its ordered references. A reference whose track is
/// gone comes back without a snapshot.
pub async fn get_composition(pool: &SqlitePool, id: CompositionId) -> Result<Option<Composition>> {
    let row = sqlx::query(&format!("SELECT {} FROM compositions WHERE guid = ?", SUMMARY_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let summary = summary_from_row(&row)?;

    let rows = sqlx::query(
        r#"
        SELECT
            composition_tracks.guid AS ref_id,
            composition_tracks.track_id AS track_id,
            tracks.guid AS resolved_id,
            tracks.source_id AS source_id,
            tracks.artist AS artist,
            tracks.title AS title,
            COALESCE(tracks.start_offset_ms, tracks.raw_start_offset_ms) AS start_offset_ms,
            COALESCE(tracks.end_offset_ms, tracks.raw_end_offset_ms) AS end_offset_ms
        FROM composition_tracks
        LEFT JOIN tracks ON tracks.guid = composition_tracks.track_id
        WHERE composition_tracks.composition_id = ?
        ORDER BY composition_tracks.list_index
        "#,
    )
    .bind(id.to_string())
    .fetch_all(pool)
    .await?;

    let mut tracks = Vec::with_capacity(rows.len());
    for row in &rows {
        let resolved: Option<String> = row.try_get("resolved_id")?;
        let track = match resolved {
            Some(_) => Some(TrackSnapshot {
                source_id: parse_column(&row.try_get::<String, _>("source_id")?)?,
                artist: row.try_get("artist")?,
                title: row.try_get("title")?,
                start_offset_ms: row.try_get("start_offset_ms")?,
                end_offset_ms: row.try_get("end_offset_ms")?,
            }),
            None => None,
        };
        tracks.push(TrackRef {
            id: parse_column(&row.try_get::<String, _>("ref_id")?)?,
            track_id: parse_column(&row.try_get::<String, _>("track_id")?)?,
            track,
        });
    }

    Ok(Some(Composition {
        id: summary.id,
        name: summary.name,
        kind: summary.kind,
        artist: summary.artist,
        released_at: summary.released_at,
        thumbnail_id: summary.thumbnail_id,
        created_at: summary.created_at,
        tracks,
    }))
}

/// All compositions, newest first
pub async fn list_compositions(pool: &SqlitePool) -> Result<Vec<CompositionSummary>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM compositions ORDER BY compositions.created_at DESC, compositions.guid",
        SUMMARY_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(summary_from_row).collect()
}

/// References cascade with the composition; tracks are untouched
pub async fn delete_composition(pool: &SqlitePool, id: CompositionId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM compositions WHERE guid = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// One row per reference to any of `tracks`
pub async fn compositions_referencing(pool: &SqlitePool, tracks: &[TrackId]) -> Result<Vec<CompositionSummary>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {}
        FROM compositions
        JOIN composition_tracks ON composition_tracks.composition_id = compositions.guid
        WHERE composition_tracks.track_id IN (SELECT value FROM json_each(?))
        ORDER BY compositions.created_at DESC, compositions.guid
        "#,
        SUMMARY_COLUMNS
    ))
    .bind(id_list(tracks)?)
    .fetch_all(pool)
    .await?;

    rows.iter().map(summary_from_row).collect()
}

pub async fn reference_owners(
    pool: &SqlitePool,
    refs: &[TrackRefId],
) -> Result<Vec<(TrackRefId, CompositionId)>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, composition_id
        FROM composition_tracks
        WHERE guid IN (SELECT value FROM json_each(?))
        "#,
    )
    .bind(id_list(refs)?)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok((
                parse_column(&row.try_get::<String, _>("guid")?)?,
                parse_column(&row.try_get::<String, _>("composition_id")?)?,
            ))
        })
        .collect()
}
