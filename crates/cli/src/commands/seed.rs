use docflow_db::{seed_demo_participants, DEMO_PARTICIPANTS};

use crate::commands::{load_config, open_migrated_pool, runtime, CommandResult, Failure};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_migrated_pool(&config).await?;
        let seeded = seed_demo_participants(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8));
        pool.close().await;
        seeded
    });

    match result {
        Ok(count) => CommandResult::success("seed", seed_message(count)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn seed_message(count: usize) -> String {
    let directory = DEMO_PARTICIPANTS
        .iter()
        .map(|(actor_id, display_name)| format!("  - {actor_id}: {display_name}"))
        .collect::<Vec<_>>();
    format!("registered {count} demo participants:\n{}", directory.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::seed_message;

    #[test]
    fn message_lists_every_demo_participant() {
        let message = seed_message(5);

        assert!(message.starts_with("registered 5 demo participants:"));
        assert!(message.contains("  - U100: Requester"));
        assert!(message.contains("  - U3: Department head"));
    }
}
