use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use shared::{domain::Plug, filter::FilterValue};

mod memory;
mod observed;

pub use memory::MemoryStore;
pub use observed::{ObservedValues, ValuesSnapshot};

/// Keyed persistence of current filter values.
///
/// Writes are upserts by key and independent of each other; there is no
/// cross-key transaction.
#[async_trait]
pub trait FilterValueStore: Send + Sync {
    async fn load_filter_values(&self) -> Result<Vec<FilterValue>>;
    async fn upsert_filter_value(&self, value: &FilterValue) -> Result<()>;
}

/// Local cache of the plug catalog.
#[async_trait]
pub trait PlugStore: Send + Sync {
    async fn load_plugs(&self) -> Result<Vec<Plug>>;
    async fn replace_plugs(&self, plugs: &[Plug]) -> Result<()>;
}

#[async_trait]
impl<S: FilterValueStore + ?Sized> FilterValueStore for Arc<S> {
    async fn load_filter_values(&self) -> Result<Vec<FilterValue>> {
        (**self).load_filter_values().await
    }

    async fn upsert_filter_value(&self, value: &FilterValue) -> Result<()> {
        (**self).upsert_filter_value(value).await
    }
}

#[async_trait]
impl<S: PlugStore + ?Sized> PlugStore for Arc<S> {
    async fn load_plugs(&self) -> Result<Vec<Plug>> {
        (**self).load_plugs().await
    }

    async fn replace_plugs(&self, plugs: &[Plug]) -> Result<()> {
        (**self).replace_plugs(plugs).await
    }
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredFilterValue {
    pub value: FilterValue,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Every persisted value, including ones no current filter refers to.
    pub async fn list_stored_filter_values(&self) -> Result<Vec<StoredFilterValue>> {
        let rows = sqlx::query("SELECT key, payload, updated_at FROM filter_values ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .context("failed to list filter values")?;

        rows.into_iter()
            .map(|r| {
                let key = r.get::<String, _>(0);
                let value = decode_filter_value(&key, &r.get::<String, _>(1))?;
                Ok(StoredFilterValue {
                    value,
                    updated_at: r.get::<DateTime<Utc>, _>(2),
                })
            })
            .collect()
    }

    pub async fn delete_filter_value(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM filter_values WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete filter value {key}"))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_filter_values(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM filter_values")
            .execute(&self.pool)
            .await
            .context("failed to clear filter values")?;
        Ok(result.rows_affected())
    }
}

fn decode_filter_value(key: &str, payload: &str) -> Result<FilterValue> {
    let value: FilterValue = serde_json::from_str(payload)
        .with_context(|| format!("corrupt filter value payload for key {key}"))?;
    anyhow::ensure!(
        value.key() == key,
        "filter value row {key} carries payload for key {}",
        value.key()
    );
    Ok(value)
}

#[async_trait]
impl FilterValueStore for Storage {
    async fn load_filter_values(&self) -> Result<Vec<FilterValue>> {
        let rows = sqlx::query("SELECT key, payload FROM filter_values ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .context("failed to load filter values")?;

        rows.into_iter()
            .map(|r| decode_filter_value(&r.get::<String, _>(0), &r.get::<String, _>(1)))
            .collect()
    }

    async fn upsert_filter_value(&self, value: &FilterValue) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        sqlx::query(
            "INSERT INTO filter_values (key, kind, payload, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET kind = excluded.kind, payload = excluded.payload, updated_at = excluded.updated_at",
        )
        .bind(value.key())
        .bind(value.kind().as_str())
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write filter value {}", value.key()))?;
        Ok(())
    }
}

#[async_trait]
impl PlugStore for Storage {
    async fn load_plugs(&self) -> Result<Vec<Plug>> {
        let rows = sqlx::query("SELECT name FROM plugs ORDER BY position ASC")
            .fetch_all(&self.pool)
            .await
            .context("failed to load cached plugs")?;
        Ok(rows
            .into_iter()
            .map(|r| Plug::new(r.get::<String, _>(0)))
            .collect())
    }

    async fn replace_plugs(&self, plugs: &[Plug]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM plugs").execute(&mut *tx).await?;
        let fetched_at = Utc::now();
        for (position, plug) in plugs.iter().enumerate() {
            sqlx::query(
                "INSERT INTO plugs (name, position, fetched_at) VALUES (?, ?, ?)
                 ON CONFLICT(name) DO NOTHING",
            )
            .bind(&plug.name)
            .bind(position as i64)
            .bind(fetched_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await.context("failed to replace cached plugs")?;
        Ok(())
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
