use docflow_core::domain::document::ActorId;

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, SqlParticipantRegistry};

/// Demo directory used by `docflow smoke` and local setups.
pub const DEMO_PARTICIPANTS: &[(ActorId, &str)] = &[
    (ActorId(100), "Requester"),
    (ActorId(1), "Team lead"),
    (ActorId(2), "Finance partner"),
    (ActorId(3), "Department head"),
    (ActorId(4), "HR observer"),
];

pub async fn seed_demo_participants(pool: &DbPool) -> Result<usize, RepositoryError> {
    let registry = SqlParticipantRegistry::new(pool.clone());
    for (actor_id, display_name) in DEMO_PARTICIPANTS {
        registry.register(*actor_id, display_name).await?;
    }
    Ok(DEMO_PARTICIPANTS.len())
}
