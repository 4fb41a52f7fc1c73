use std::{fs, path::Path, str::FromStr};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};

use shared::domain::{AgendaItem, ItemId};

/// Durable store for the facilitator's agenda and meeting window.
///
/// Timer phases and in-flight elapsed values are deliberately never
/// persisted: a reload must come back up with every timer stopped.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        let storage = Self { pool };
        storage.ensure_schema().await?;
        Ok(storage)
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agenda_items (
                id                INTEGER PRIMARY KEY,
                position          INTEGER NOT NULL,
                name              TEXT NOT NULL,
                allocated_seconds INTEGER NOT NULL,
                used_seconds      INTEGER NOT NULL DEFAULT 0,
                completed         INTEGER NOT NULL DEFAULT 0,
                started_at        TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure agenda_items table exists")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS meeting_window (
                id       INTEGER PRIMARY KEY CHECK (id = 1),
                start_at TEXT NOT NULL,
                end_at   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure meeting_window table exists")?;

        Ok(())
    }

    /// Replaces the stored agenda with the given ordered sequence.
    pub async fn save_agenda(&self, items: &[AgendaItem]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM agenda_items")
            .execute(&mut *tx)
            .await?;
        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO agenda_items
                 (id, position, name, allocated_seconds, used_seconds, completed, started_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(item.id.0)
            .bind(position as i64)
            .bind(&item.name)
            .bind(item.allocated_seconds)
            .bind(item.used_seconds)
            .bind(item.completed)
            .bind(item.started_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn load_agenda(&self) -> Result<Vec<AgendaItem>> {
        let rows = sqlx::query(
            "SELECT id, name, allocated_seconds, used_seconds, completed, started_at
             FROM agenda_items ORDER BY position",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(AgendaItem {
                id: ItemId(row.try_get("id")?),
                name: row.try_get("name")?,
                allocated_seconds: row.try_get("allocated_seconds")?,
                used_seconds: row.try_get("used_seconds")?,
                completed: row.try_get("completed")?,
                started_at: row.try_get("started_at")?,
            });
        }
        Ok(items)
    }

    pub async fn save_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO meeting_window (id, start_at, end_at) VALUES (1, ?, ?)
             ON CONFLICT(id) DO UPDATE SET start_at=excluded.start_at, end_at=excluded.end_at",
        )
        .bind(start)
        .bind(end)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load_window(&self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let row = sqlx::query("SELECT start_at, end_at FROM meeting_window WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some((row.try_get("start_at")?, row.try_get("end_at")?))),
            None => Ok(None),
        }
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return Ok(());
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();
    if path.is_empty() {
        return Ok(());
    }

    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create parent directory '{}' for database url '{database_url}'",
                parent.display()
            )
        })?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
