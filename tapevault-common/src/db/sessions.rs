//! Scrobble session storage

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::SqliteStore;
use crate::scrobble::{ScrobbleSession, SessionStore};
use crate::Result;

pub async fn save_session(pool: &SqlitePool, username: &str, session_key: &str) -> Result<ScrobbleSession> {
    let now = Utc::now();
    let row = sqlx::query(
        r#"
        INSERT INTO scrobble_sessions (username, session_key, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(username) DO UPDATE SET
            session_key = excluded.session_key,
            updated_at = excluded.updated_at
        RETURNING username, session_key, updated_at
        "#,
    )
    .bind(username)
    .bind(session_key)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(ScrobbleSession {
        username: row.try_get("username")?,
        session_key: row.try_get("session_key")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn latest_session(pool: &SqlitePool) -> Result<Option<ScrobbleSession>> {
    let row = sqlx::query(
        r#"
        SELECT username, session_key, updated_at
        FROM scrobble_sessions
        ORDER BY updated_at DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    row.map(|row| {
        Ok(ScrobbleSession {
            username: row.try_get("username")?,
            session_key: row.try_get("session_key")?,
            updated_at: row.try_get("updated_at")?,
        })
    })
    .transpose()
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn save_session(&self, username: &str, session_key: &str) -> Result<ScrobbleSession> {
        save_session(self.pool(), username, session_key).await
    }

    async fn latest_session(&self) -> Result<Option<ScrobbleSession>> {
        latest_session(self.pool()).await
    }
}
