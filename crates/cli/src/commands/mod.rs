pub mod chat;
pub mod tools;

use toolrelay_agent::MergePolicy;
use toolrelay_config::{AppConfig, ConflictPolicy};

/// Load the config, with a readable error.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    AppConfig::load().map_err(|e| format!("Failed to load config: {e}").into())
}

pub fn merge_policy(policy: ConflictPolicy) -> MergePolicy {
    match policy {
        ConflictPolicy::LastWriteWins => MergePolicy::LastWriteWins,
        ConflictPolicy::Strict => MergePolicy::Strict,
    }
}
