//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config: AppConfig = toml::from_str(&content)
    .with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;

  info!(
    bots = config.bots.len(),
    confirmation_timeout_secs = config.orchestrator.confirmation_timeout_secs,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Non-empty bot registry with distinct IDs
/// - Positive capacities and timing values
/// - Well-formed endpoint URLs
fn validate_config(config: &AppConfig) -> Result<()> {
  // Registry validation
  anyhow::ensure!(
    !config.bots.is_empty(),
    "At least one bot must be configured"
  );

  for (i, bot) in config.bots.iter().enumerate() {
    anyhow::ensure!(
      !bot.id.is_empty(),
      "Bot {} has an empty id",
      i
    );
    anyhow::ensure!(
      !bot.username.is_empty(),
      "Bot {} ({}) has an empty username",
      i,
      bot.id
    );
    anyhow::ensure!(
      bot.user_id > 0,
      "Bot {} ({}) has an invalid user_id",
      i,
      bot.id
    );
    anyhow::ensure!(
      !bot.game_id.is_empty(),
      "Bot {} ({}) has an empty game_id",
      i,
      bot.id
    );
    anyhow::ensure!(
      bot.capacity > 0,
      "Bot {} ({}) must have capacity > 0",
      i,
      bot.id
    );
  }

  let mut ids: Vec<&str> = config.bots.iter().map(|b| b.id.as_str()).collect();
  ids.sort_unstable();
  ids.dedup();
  anyhow::ensure!(
    ids.len() == config.bots.len(),
    "Bot registry contains duplicate ids"
  );

  // Orchestrator timing validation
  anyhow::ensure!(
    config.orchestrator.confirmation_timeout_secs > 0,
    "confirmation_timeout_secs must be positive"
  );
  anyhow::ensure!(
    config.orchestrator.poll_initial_delay_ms > 0,
    "poll_initial_delay_ms must be positive"
  );
  anyhow::ensure!(
    config.orchestrator.poll_max_delay_secs * 1000 >= config.orchestrator.poll_initial_delay_ms,
    "poll_max_delay_secs must be at least poll_initial_delay_ms"
  );
  anyhow::ensure!(
    config.orchestrator.sweep_interval_secs > 0,
    "sweep_interval_secs must be positive"
  );

  // Platform endpoint validation
  anyhow::ensure!(
    !config.social.users_base_url.is_empty(),
    "Users API base URL must not be empty"
  );
  anyhow::ensure!(
    !config.social.friends_base_url.is_empty(),
    "Friends API base URL must not be empty"
  );
  anyhow::ensure!(
    !config.social.thumbnails_base_url.is_empty(),
    "Thumbnails API base URL must not be empty"
  );
  anyhow::ensure!(
    config.social.max_concurrent > 0,
    "social.max_concurrent must be positive"
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_validate_rejects_empty_registry() {
    let toml = r#"
      bots = []

      [bot]
      name = "pawmart-orchestrator"

      [api]

      [social]
      users_base_url = "https://users.example.com"
      friends_base_url = "https://friends.example.com"
      thumbnails_base_url = "https://thumbnails.example.com"

      [orchestrator]

      [metrics]

      [persistence]
    "#;
    let config: AppConfig = toml::from_str(toml).unwrap();
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_validate_rejects_duplicate_bot_ids() {
    let toml = r#"
      [bot]
      name = "pawmart-orchestrator"

      [api]

      [social]
      users_base_url = "https://users.example.com"
      friends_base_url = "https://friends.example.com"
      thumbnails_base_url = "https://thumbnails.example.com"

      [orchestrator]

      [[bots]]
      id = "bot-a"
      username = "PawMartBotA"
      user_id = 101
      game_id = "8737899170"

      [[bots]]
      id = "bot-a"
      username = "PawMartBotA2"
      user_id = 102
      game_id = "8737899170"

      [metrics]

      [persistence]
    "#;
    let config: AppConfig = toml::from_str(toml).unwrap();
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_minimal_config_accepted() {
    let toml = r#"
      [bot]
      name = "pawmart-orchestrator"

      [api]

      [social]
      users_base_url = "https://users.example.com"
      friends_base_url = "https://friends.example.com"
      thumbnails_base_url = "https://thumbnails.example.com"

      [orchestrator]

      [[bots]]
      id = "bot-a"
      username = "PawMartBotA"
      user_id = 101
      game_id = "8737899170"

      [metrics]

      [persistence]
    "#;
    let config: AppConfig = toml::from_str(toml).unwrap();
    validate_config(&config).unwrap();
    assert_eq!(config.bots[0].capacity, 3);
    assert!(config.bots[0].online);
  }
}
