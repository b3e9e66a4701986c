//! User persistence — async `UserStore` trait plus backends.
//!
//! The orchestration core only ever sees this trait. Operations signal soft
//! failure by returning `Ok(false)`/`Ok(None)`; callers treat that the same
//! as a hard `StorageError` (a tool failure, never a fatal one).

pub mod libsql_backend;
pub mod memory;

pub use libsql_backend::LibSqlStore;
pub use memory::InMemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// A challenge assigned to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRecord {
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub correct: Option<bool>,
    #[serde(default)]
    pub completed: bool,
    pub assigned_at: DateTime<Utc>,
}

/// Persisted state of a user, keyed by phone number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserState {
    pub phone_number: String,
    pub name: String,
    pub interests: String,
    /// Set exactly once by a successful registration; never reset.
    pub onboarding_completed: bool,
    pub challenges_completed: u32,
    #[serde(default)]
    pub challenges_sent: Vec<ChallengeRecord>,
    #[serde(default)]
    pub last_challenge_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserState {
    /// Fresh registered user.
    pub fn new(phone_number: &str, name: &str, interests: &str) -> Self {
        let now = Utc::now();
        Self {
            phone_number: phone_number.to_string(),
            name: name.to_string(),
            interests: interests.to_string(),
            onboarding_completed: true,
            challenges_completed: 0,
            challenges_sent: Vec::new(),
            last_challenge_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Most recently assigned challenge, if any.
    pub fn latest_challenge(&self) -> Option<&ChallengeRecord> {
        self.challenges_sent.last()
    }
}

/// Backend-agnostic user storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user. `Ok(None)` means not registered.
    async fn get_user(&self, phone_number: &str) -> Result<Option<UserState>, StorageError>;

    /// Register a user with `onboarding_completed = true`.
    ///
    /// Idempotent: an already-registered identity is left untouched and the
    /// call still reports success, so a repeated registration can never
    /// reset onboarding state or the completion counter.
    async fn create_user(
        &self,
        phone_number: &str,
        name: &str,
        interests: &str,
    ) -> Result<bool, StorageError>;

    /// Replace the interests paragraph.
    async fn update_user_interests(
        &self,
        phone_number: &str,
        interests: &str,
    ) -> Result<bool, StorageError>;

    /// Bump the completed-challenges counter by one.
    async fn increment_challenges_completed(&self, phone_number: &str)
    -> Result<bool, StorageError>;

    /// Update the date of the last assigned challenge.
    async fn update_last_challenge_date(
        &self,
        phone_number: &str,
        date: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// Append an assigned challenge to the user's record.
    async fn record_challenge(
        &self,
        phone_number: &str,
        challenge: ChallengeRecord,
    ) -> Result<bool, StorageError>;
}
