//! Participant roster.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::core::{
    ClientStatus, ClientStatusLookup, ParticipantId, ParticipantKind, ParticipantStatus,
};

/// Errors from the participant registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Display name was empty or whitespace.
    #[error("participant name must not be empty")]
    EmptyName,

    /// No participant with this id.
    #[error("unknown participant: {0}")]
    UnknownParticipant(ParticipantId),
}

/// One roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Id.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
    /// Live session or manually added.
    pub kind: ParticipantKind,
    /// Connection status.
    pub status: ParticipantStatus,
    /// Milliseconds since the Unix epoch.
    pub connected_at: u64,
    /// Milliseconds since the Unix epoch.
    pub last_activity: u64,
}

impl Participant {
    fn status(&self) -> ClientStatus {
        ClientStatus {
            status: self.status,
            display_name: self.name.clone(),
        }
    }
}

/// Registered participants, keyed by id.
///
/// Live participants bring their own id (the session id); manual ones get
/// `manual_<n>` from a counter.
#[derive(Debug)]
pub struct ParticipantRegistry {
    participants: RwLock<HashMap<ParticipantId, Participant>>,
    next_manual: AtomicU64,
}

impl ParticipantRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            participants: RwLock::new(HashMap::new()),
            next_manual: AtomicU64::new(1),
        }
    }

    /// Register a participant attached to a live session.
    ///
    /// Re-registering an id replaces the entry. The participant starts
    /// disconnected.
    pub async fn register_live(
        &self,
        id: ParticipantId,
        name: &str,
    ) -> Result<Participant, RegistryError> {
        self.insert(id, name, ParticipantKind::Live).await
    }

    /// Add a participant with no session behind it.
    pub async fn add_manual(&self, name: &str) -> Result<Participant, RegistryError> {
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let n = self.next_manual.fetch_add(1, Ordering::Relaxed);
        let id = ParticipantId::new(format!("manual_{n}"));
        self.insert(id, name, ParticipantKind::Manual).await
    }

    async fn insert(
        &self,
        id: ParticipantId,
        name: &str,
        kind: ParticipantKind,
    ) -> Result<Participant, RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let now = now_millis();
        let participant = Participant {
            id: id.clone(),
            name: name.to_string(),
            kind,
            status: ParticipantStatus::Disconnected,
            connected_at: now,
            last_activity: now,
        };
        self.participants
            .write()
            .await
            .insert(id.clone(), participant.clone());
        info!(participant = %id, ?kind, "participant registered");
        Ok(participant)
    }

    /// Remove a participant.
    pub async fn remove(&self, id: &ParticipantId) -> Result<Participant, RegistryError> {
        let removed = self.participants.write().await.remove(id);
        match removed {
            Some(participant) => {
                info!(participant = %id, "participant removed");
                Ok(participant)
            }
            None => Err(RegistryError::UnknownParticipant(id.clone())),
        }
    }

    /// Look up a participant.
    pub async fn participant(&self, id: &ParticipantId) -> Option<Participant> {
        self.participants.read().await.get(id).cloned()
    }

    /// Update a participant's status.
    pub async fn update_status(
        &self,
        id: &ParticipantId,
        status: ParticipantStatus,
    ) -> Result<(), RegistryError> {
        let mut participants = self.participants.write().await;
        let participant = participants
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownParticipant(id.clone()))?;
        participant.status = status;
        participant.last_activity = now_millis();
        debug!(participant = %id, ?status, "participant status updated");
        Ok(())
    }

    /// Record activity.
    pub async fn touch(&self, id: &ParticipantId) -> Result<(), RegistryError> {
        let mut participants = self.participants.write().await;
        let participant = participants
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownParticipant(id.clone()))?;
        participant.last_activity = now_millis();
        Ok(())
    }

    /// All participants, ordered by id.
    pub async fn list(&self) -> Vec<Participant> {
        let mut all: Vec<_> = self.participants.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Number of participants.
    pub async fn len(&self) -> usize {
        self.participants.read().await.len()
    }

    /// Whether the roster is empty.
    pub async fn is_empty(&self) -> bool {
        self.participants.read().await.is_empty()
    }
}

impl Default for ParticipantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientStatusLookup for ParticipantRegistry {
    fn get(&self, participant: &ParticipantId) -> impl Future<Output = Option<ClientStatus>> + Send {
        async move {
            self.participants
                .read()
                .await
                .get(participant)
                .map(Participant::status)
        }
    }

    fn set_status(
        &self,
        participant: &ParticipantId,
        status: ParticipantStatus,
    ) -> impl Future<Output = bool> + Send {
        async move { self.update_status(participant, status).await.is_ok() }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_ids_are_sequential() {
        let registry = ParticipantRegistry::new();
        let a = registry.add_manual("Alice").await.unwrap();
        let b = registry.add_manual("Bob").await.unwrap();
        assert_eq!(a.id, ParticipantId::from("manual_1"));
        assert_eq!(b.id, ParticipantId::from("manual_2"));
        assert_eq!(a.kind, ParticipantKind::Manual);
        assert_eq!(a.status, ParticipantStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let registry = ParticipantRegistry::new();
        assert_eq!(registry.add_manual("  ").await, Err(RegistryError::EmptyName));
        assert_eq!(
            registry.register_live("s1".into(), "").await,
            Err(RegistryError::EmptyName)
        );
        assert!(registry.is_empty().await);
        // A rejected name does not consume an id.
        let c = registry.add_manual("Carol").await.unwrap();
        assert_eq!(c.id, ParticipantId::from("manual_1"));
    }

    #[tokio::test]
    async fn test_register_live_and_remove() {
        let registry = ParticipantRegistry::new();
        let p = registry.register_live("sock-42".into(), " Dana ").await.unwrap();
        assert_eq!(p.name, "Dana");
        assert_eq!(p.kind, ParticipantKind::Live);
        assert_eq!(registry.len().await, 1);

        let removed = registry.remove(&"sock-42".into()).await.unwrap();
        assert_eq!(removed.id, p.id);
        assert_eq!(
            registry.remove(&"sock-42".into()).await,
            Err(RegistryError::UnknownParticipant("sock-42".into()))
        );
    }

    #[tokio::test]
    async fn test_status_lookup() {
        let registry = ParticipantRegistry::new();
        let p = registry.add_manual("Eve").await.unwrap();

        let status = registry.get(&p.id).await.unwrap();
        assert_eq!(status.status, ParticipantStatus::Disconnected);
        assert_eq!(status.display_name, "Eve");

        assert!(registry.set_status(&p.id, ParticipantStatus::Connected).await);
        assert_eq!(
            registry.participant(&p.id).await.unwrap().status,
            ParticipantStatus::Connected
        );

        assert!(!registry.set_status(&"ghost".into(), ParticipantStatus::Connected).await);
        assert!(registry.get(&"ghost".into()).await.is_none());
    }

    #[tokio::test]
    async fn test_touch_and_list() {
        let registry = ParticipantRegistry::new();
        registry.register_live("b".into(), "Bee").await.unwrap();
        registry.register_live("a".into(), "Ay").await.unwrap();
        registry.touch(&"a".into()).await.unwrap();
        assert!(registry.touch(&"z".into()).await.is_err());

        let ids: Vec<_> = registry.list().await.into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![ParticipantId::from("a"), ParticipantId::from("b")]);
    }
}
