use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::document::ActorId;

/// Resolves user identities for line validation.
#[async_trait]
pub trait ParticipantRegistry: Send + Sync {
    async fn exists(&self, actor_id: ActorId) -> Result<bool, String>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryParticipantRegistry {
    participants: HashSet<ActorId>,
}

impl InMemoryParticipantRegistry {
    pub fn with_participants(participants: impl IntoIterator<Item = ActorId>) -> Self {
        Self { participants: participants.into_iter().collect() }
    }
}

#[async_trait]
impl ParticipantRegistry for InMemoryParticipantRegistry {
    async fn exists(&self, actor_id: ActorId) -> Result<bool, String> {
        Ok(self.participants.contains(&actor_id))
    }
}
