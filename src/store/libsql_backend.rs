//! libSQL backend — async `UserStore` implementation.
//!
//! Single-table schema keyed by phone number. Challenge records live in a
//! JSON column; datetimes are stored as RFC 3339 text.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use crate::error::StorageError;
use crate::store::{ChallengeRecord, UserState, UserStore};

const USER_COLUMNS: &str = "phone_number, name, interests, onboarding_completed, \
     challenges_completed, challenges_sent, last_challenge_date, created_at, updated_at";

/// libSQL user storage.
///
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use,
/// so a single connection is reused for all operations.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StorageError::Connection(format!("Failed to open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StorageError::Connection(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "User database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StorageError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StorageError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        let conn = db
            .connect()
            .map_err(|e| StorageError::Connection(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        self.conn()
            .execute(
                "CREATE TABLE IF NOT EXISTS users (
                    phone_number TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    interests TEXT NOT NULL,
                    onboarding_completed INTEGER NOT NULL DEFAULT 1,
                    challenges_completed INTEGER NOT NULL DEFAULT 0,
                    challenges_sent TEXT NOT NULL DEFAULT '[]',
                    last_challenge_date TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )",
                (),
            )
            .await
            .map_err(|e| StorageError::Query(format!("init_schema: {e}")))?;
        Ok(())
    }

    /// Load the challenge list for a user, needed before appending.
    async fn load_challenges(
        &self,
        phone_number: &str,
    ) -> Result<Option<Vec<ChallengeRecord>>, StorageError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT challenges_sent FROM users WHERE phone_number = ?1",
                params![phone_number],
            )
            .await
            .map_err(|e| StorageError::Query(format!("load_challenges: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let raw: String = row
                    .get(0)
                    .map_err(|e| StorageError::Query(format!("load_challenges row: {e}")))?;
                let challenges = serde_json::from_str(&raw)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(challenges))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StorageError::Query(format!("load_challenges: {e}"))),
        }
    }
}

// ── Row helpers ─────────────────────────────────────────────────────

/// Parse an RFC 3339 datetime string (our canonical write format).
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn row_to_user(row: &libsql::Row) -> Result<UserState, libsql::Error> {
    let phone_number: String = row.get(0)?;
    let name: String = row.get(1)?;
    let interests: String = row.get(2)?;
    let onboarding_completed: i64 = row.get(3)?;
    let challenges_completed: i64 = row.get(4)?;
    let challenges_raw: String = row.get(5)?;
    let last_challenge_date: Option<String> = row.get(6).ok();
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(UserState {
        phone_number,
        name,
        interests,
        onboarding_completed: onboarding_completed != 0,
        challenges_completed: challenges_completed.max(0) as u32,
        challenges_sent: serde_json::from_str(&challenges_raw).unwrap_or_default(),
        last_challenge_date: last_challenge_date.as_deref().map(parse_datetime),
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

#[async_trait]
impl UserStore for LibSqlStore {
    async fn get_user(&self, phone_number: &str) -> Result<Option<UserState>, StorageError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE phone_number = ?1"),
                params![phone_number],
            )
            .await
            .map_err(|e| StorageError::Query(format!("get_user: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let user = row_to_user(&row)
                    .map_err(|e| StorageError::Query(format!("get_user row parse: {e}")))?;
                Ok(Some(user))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StorageError::Query(format!("get_user: {e}"))),
        }
    }

    async fn create_user(
        &self,
        phone_number: &str,
        name: &str,
        interests: &str,
    ) -> Result<bool, StorageError> {
        let now = Utc::now().to_rfc3339();
        // INSERT OR IGNORE keeps registration idempotent: an existing row is
        // never overwritten, so onboarding state and counters survive.
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO users \
                 (phone_number, name, interests, onboarding_completed, challenges_completed, \
                  challenges_sent, last_challenge_date, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, 1, 0, '[]', NULL, ?4, ?4)",
                params![phone_number, name, interests, now],
            )
            .await
            .map_err(|e| StorageError::Query(format!("create_user: {e}")))?;

        info!(user = %phone_number, "User created");
        Ok(true)
    }

    async fn update_user_interests(
        &self,
        phone_number: &str,
        interests: &str,
    ) -> Result<bool, StorageError> {
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn()
            .execute(
                "UPDATE users SET interests = ?1, updated_at = ?2 WHERE phone_number = ?3",
                params![interests, now, phone_number],
            )
            .await
            .map_err(|e| StorageError::Query(format!("update_user_interests: {e}")))?;
        Ok(changed > 0)
    }

    async fn increment_challenges_completed(
        &self,
        phone_number: &str,
    ) -> Result<bool, StorageError> {
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn()
            .execute(
                "UPDATE users SET challenges_completed = challenges_completed + 1, \
                 updated_at = ?1 WHERE phone_number = ?2",
                params![now, phone_number],
            )
            .await
            .map_err(|e| StorageError::Query(format!("increment_challenges_completed: {e}")))?;
        Ok(changed > 0)
    }

    async fn update_last_challenge_date(
        &self,
        phone_number: &str,
        date: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn()
            .execute(
                "UPDATE users SET last_challenge_date = ?1, updated_at = ?2 WHERE phone_number = ?3",
                params![date.to_rfc3339(), now, phone_number],
            )
            .await
            .map_err(|e| StorageError::Query(format!("update_last_challenge_date: {e}")))?;
        Ok(changed > 0)
    }

    async fn record_challenge(
        &self,
        phone_number: &str,
        challenge: ChallengeRecord,
    ) -> Result<bool, StorageError> {
        let Some(mut challenges) = self.load_challenges(phone_number).await? else {
            return Ok(false);
        };
        let assigned_at = challenge.assigned_at;
        challenges.push(challenge);
        let serialized = serde_json::to_string(&challenges)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn()
            .execute(
                "UPDATE users SET challenges_sent = ?1, last_challenge_date = ?2, \
                 updated_at = ?3 WHERE phone_number = ?4",
                params![serialized, assigned_at.to_rfc3339(), now, phone_number],
            )
            .await
            .map_err(|e| StorageError::Query(format!("record_challenge: {e}")))?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_roundtrip() {
        let store = LibSqlStore::new_memory().await.unwrap();
        assert!(store.get_user("+5215550001").await.unwrap().is_none());

        store
            .create_user("+5215550001", "Ana", "ajedrez y cocina")
            .await
            .unwrap();

        let user = store.get_user("+5215550001").await.unwrap().unwrap();
        assert_eq!(user.name, "Ana");
        assert_eq!(user.interests, "ajedrez y cocina");
        assert!(user.onboarding_completed);
        assert_eq!(user.challenges_completed, 0);
        assert!(user.challenges_sent.is_empty());
        assert!(user.last_challenge_date.is_none());
    }

    #[tokio::test]
    async fn test_create_user_does_not_overwrite() {
        let store = LibSqlStore::new_memory().await.unwrap();
        store.create_user("+52", "Ana", "ajedrez").await.unwrap();
        store.increment_challenges_completed("+52").await.unwrap();

        store.create_user("+52", "Otra", "nada").await.unwrap();
        let user = store.get_user("+52").await.unwrap().unwrap();
        assert_eq!(user.name, "Ana");
        assert_eq!(user.challenges_completed, 1);
    }

    #[tokio::test]
    async fn test_updates_report_missing_user() {
        let store = LibSqlStore::new_memory().await.unwrap();
        assert!(!store.update_user_interests("+52", "x").await.unwrap());
        assert!(!store.increment_challenges_completed("+52").await.unwrap());
        assert!(
            !store
                .update_last_challenge_date("+52", Utc::now())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_record_challenge_roundtrip() {
        let store = LibSqlStore::new_memory().await.unwrap();
        store.create_user("+52", "Ana", "ajedrez").await.unwrap();

        let challenge = ChallengeRecord {
            prompt: "Resuelve un mate en dos".into(),
            options: vec!["a".into(), "b".into(), "c".into()],
            answer: Some("b".into()),
            correct: Some(true),
            completed: true,
            assigned_at: Utc::now(),
        };
        assert!(store.record_challenge("+52", challenge).await.unwrap());

        let user = store.get_user("+52").await.unwrap().unwrap();
        assert_eq!(user.challenges_sent.len(), 1);
        let latest = user.latest_challenge().unwrap();
        assert_eq!(latest.answer.as_deref(), Some("b"));
        assert_eq!(latest.correct, Some(true));
        assert!(user.last_challenge_date.is_some());
    }

    #[tokio::test]
    async fn test_on_disk_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.db");
        let store = LibSqlStore::new_local(&path).await.unwrap();
        store.create_user("+52", "Ana", "ajedrez").await.unwrap();
        assert!(store.get_user("+52").await.unwrap().is_some());
    }
}
