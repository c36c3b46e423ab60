use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::{error::Result, models::ConsultationTurn};

/// Trait for persisting and reading consultation turns
#[async_trait]
pub trait ConsultationStore: Send + Sync {
    /// Append a new turn. Turns are never updated afterwards.
    async fn save(&self, turn: &ConsultationTurn) -> Result<()>;

    /// The first `limit` turns of a session, oldest first.
    async fn list(&self, session_id: &str, limit: usize) -> Result<Vec<ConsultationTurn>>;

    /// The last `limit` turns of a session, still oldest first.
    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<ConsultationTurn>>;

    /// Check that the backing database answers.
    async fn ping(&self) -> Result<()>;
}

/// In-memory implementation of ConsultationStore
pub struct InMemoryConsultationStore {
    turns: Arc<DashMap<String, Vec<ConsultationTurn>>>,
}

impl InMemoryConsultationStore {
    pub fn new() -> Self {
        Self {
            turns: Arc::new(DashMap::new()),
        }
    }

    fn sorted(&self, session_id: &str) -> Vec<ConsultationTurn> {
        let mut turns = self
            .turns
            .get(session_id)
            .map(|entry| entry.clone())
            .unwrap_or_default();
        // stable sort keeps insertion order for equal timestamps
        turns.sort_by_key(|turn| turn.timestamp);
        turns
    }
}

impl Default for InMemoryConsultationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConsultationStore for InMemoryConsultationStore {
    async fn save(&self, turn: &ConsultationTurn) -> Result<()> {
        self.turns
            .entry(turn.session_id.clone())
            .or_default()
            .push(turn.clone());
        Ok(())
    }

    async fn list(&self, session_id: &str, limit: usize) -> Result<Vec<ConsultationTurn>> {
        let mut turns = self.sorted(session_id);
        turns.truncate(limit);
        Ok(turns)
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<ConsultationTurn>> {
        let turns = self.sorted(session_id);
        let skip = turns.len().saturating_sub(limit);
        Ok(turns.into_iter().skip(skip).collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
