//! SQLite-backed local store for the session and device identity.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::Row;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::session::Session;

const SESSION_KEY: &str = "session_v1";
const DEVICE_TOKEN_KEY: &str = "device_token_v1";

/// Key-value store over a local SQLite file.
///
/// Last write wins: two clients sharing the file can overwrite each other's
/// session, and the loser simply re-authenticates on its next boot.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    /// Lazily initialized on first use so constructing the store never
    /// touches the filesystem.
    pool: Arc<Mutex<Option<SqlitePool>>>,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pool: Arc::new(Mutex::new(None)),
        }
    }

    /// Store under the default per-user data directory.
    pub fn in_data_dir() -> anyhow::Result<Self> {
        let mut dir = dirs::data_dir()
            .or_else(|| {
                dirs::home_dir().map(|mut h| {
                    h.push(".local");
                    h.push("share");
                    h
                })
            })
            .context("failed to resolve OS app data directory")?;
        dir.push("gatehouse");
        Ok(Self::new(dir.join("client.db")))
    }

    async fn get_pool(&self) -> anyhow::Result<SqlitePool> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create store directory at {:?}", parent))?;
        }

        let options = SqliteConnectOptions::from_str(&format!(
            "sqlite://{}",
            self.path.to_string_lossy()
        ))
        .with_context(|| format!("invalid store path {:?}", self.path))?
        .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .with_context(|| format!("failed to open session store at {:?}", self.path))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create kv table")?;

        *guard = Some(pool.clone());
        Ok(pool)
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let pool = self.get_pool().await?;
        let row = sqlx::query("SELECT value FROM kv WHERE key = ?1")
            .bind(key)
            .fetch_optional(&pool)
            .await
            .with_context(|| format!("failed to read key {key:?}"))?;
        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .with_context(|| format!("failed to write key {key:?}"))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query("DELETE FROM kv WHERE key = ?1")
            .bind(key)
            .execute(&pool)
            .await
            .with_context(|| format!("failed to delete key {key:?}"))?;
        Ok(())
    }

    /// Load the persisted session. An unreadable record is treated as
    /// absent, not an error; the caller re-authenticates.
    pub async fn load_session(&self) -> anyhow::Result<Option<Session>> {
        let Some(raw) = self.get(SESSION_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable stored session");
                self.delete(SESSION_KEY).await?;
                Ok(None)
            }
        }
    }

    pub async fn save_session(&self, session: &Session) -> anyhow::Result<()> {
        let raw = serde_json::to_string(session).context("failed to serialize session")?;
        self.put(SESSION_KEY, &raw).await
    }

    pub async fn clear_session(&self) -> anyhow::Result<()> {
        self.delete(SESSION_KEY).await
    }

    /// Stable per-installation identifier, minted on first use.
    pub async fn device_token(&self) -> anyhow::Result<String> {
        if let Some(token) = self.get(DEVICE_TOKEN_KEY).await? {
            return Ok(token);
        }
        let token = Uuid::new_v4().to_string();
        self.put(DEVICE_TOKEN_KEY, &token).await?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use gatehouse_backend::TokenGrant;

    fn temp_store() -> SessionStore {
        let path =
            std::env::temp_dir().join(format!("gatehouse-store-test-{}.db", Uuid::new_v4()));
        SessionStore::new(path)
    }

    fn session() -> Session {
        Session::from_grant(
            TokenGrant {
                access_token: "access".to_string(),
                refresh_token: Some("refresh".to_string()),
                token_type: Some("bearer".to_string()),
                expires_in: Some(3600),
                user: None,
            },
            None,
        )
    }

    #[tokio::test]
    async fn session_round_trip_and_clear() {
        let store = temp_store();
        assert!(store.load_session().await.unwrap().is_none());

        let session = session();
        store.save_session(&session).await.unwrap();
        assert_eq!(store.load_session().await.unwrap(), Some(session));

        store.clear_session().await.unwrap();
        assert!(store.load_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreadable_session_is_discarded() {
        let store = temp_store();
        store.put(SESSION_KEY, "not json").await.unwrap();
        assert!(store.load_session().await.unwrap().is_none());
        // The corrupt record is gone.
        assert!(store.get(SESSION_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn device_token_is_minted_once() {
        let store = temp_store();
        let first = store.device_token().await.unwrap();
        let second = store.device_token().await.unwrap();
        assert_eq!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
    }
}
