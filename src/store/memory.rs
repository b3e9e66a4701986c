//! In-memory `UserStore` backend for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::store::{ChallengeRecord, UserState, UserStore};

/// Volatile user storage behind an async RwLock.
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<String, UserState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a fully-formed user state (test helper).
    pub async fn insert(&self, user: UserState) {
        self.users
            .write()
            .await
            .insert(user.phone_number.clone(), user);
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn get_user(&self, phone_number: &str) -> Result<Option<UserState>, StorageError> {
        Ok(self.users.read().await.get(phone_number).cloned())
    }

    async fn create_user(
        &self,
        phone_number: &str,
        name: &str,
        interests: &str,
    ) -> Result<bool, StorageError> {
        let mut users = self.users.write().await;
        if users.contains_key(phone_number) {
            // Already registered; leave state untouched.
            return Ok(true);
        }
        users.insert(
            phone_number.to_string(),
            UserState::new(phone_number, name, interests),
        );
        tracing::info!(user = %phone_number, "User created");
        Ok(true)
    }

    async fn update_user_interests(
        &self,
        phone_number: &str,
        interests: &str,
    ) -> Result<bool, StorageError> {
        let mut users = self.users.write().await;
        match users.get_mut(phone_number) {
            Some(user) => {
                user.interests = interests.to_string();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increment_challenges_completed(
        &self,
        phone_number: &str,
    ) -> Result<bool, StorageError> {
        let mut users = self.users.write().await;
        match users.get_mut(phone_number) {
            Some(user) => {
                user.challenges_completed += 1;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_last_challenge_date(
        &self,
        phone_number: &str,
        date: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut users = self.users.write().await;
        match users.get_mut(phone_number) {
            Some(user) => {
                user.last_challenge_date = Some(date);
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_challenge(
        &self,
        phone_number: &str,
        challenge: ChallengeRecord,
    ) -> Result<bool, StorageError> {
        let mut users = self.users.write().await;
        match users.get_mut(phone_number) {
            Some(user) => {
                user.last_challenge_date = Some(challenge.assigned_at);
                user.challenges_sent.push(challenge);
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_get() {
        let store = InMemoryStore::new();
        assert!(store.get_user("+521").await.unwrap().is_none());

        assert!(store.create_user("+521", "Ana", "ajedrez").await.unwrap());
        let user = store.get_user("+521").await.unwrap().unwrap();
        assert_eq!(user.name, "Ana");
        assert!(user.onboarding_completed);
        assert_eq!(user.challenges_completed, 0);
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let store = InMemoryStore::new();
        store.create_user("+521", "Ana", "ajedrez").await.unwrap();
        store.increment_challenges_completed("+521").await.unwrap();

        // Second registration must not reset anything.
        assert!(store.create_user("+521", "Otra", "x").await.unwrap());
        let user = store.get_user("+521").await.unwrap().unwrap();
        assert_eq!(user.name, "Ana");
        assert_eq!(user.challenges_completed, 1);
        assert!(user.onboarding_completed);
    }

    #[tokio::test]
    async fn test_updates_on_missing_user_report_false() {
        let store = InMemoryStore::new();
        assert!(!store.update_user_interests("+52", "x").await.unwrap());
        assert!(!store.increment_challenges_completed("+52").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_challenge_tracks_latest() {
        let store = InMemoryStore::new();
        store.create_user("+521", "Ana", "ajedrez").await.unwrap();

        let challenge = ChallengeRecord {
            prompt: "¿Apertura favorita?".into(),
            options: vec!["Italiana".into(), "Siciliana".into()],
            answer: None,
            correct: None,
            completed: false,
            assigned_at: Utc::now(),
        };
        assert!(store.record_challenge("+521", challenge).await.unwrap());

        let user = store.get_user("+521").await.unwrap().unwrap();
        assert_eq!(user.challenges_sent.len(), 1);
        assert!(user.last_challenge_date.is_some());
        assert_eq!(user.latest_challenge().unwrap().options.len(), 2);
    }
}
