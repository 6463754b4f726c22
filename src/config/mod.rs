//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml`. The bot registry,
//! platform endpoints and all timing parameters are externalized here -
//! nothing is hardcoded in the domain layer.

pub mod loader;

use serde::Deserialize;

/// Top-level orchestrator configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the service begins accepting requests.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and metadata.
  pub bot: ServiceConfig,
  /// HTTP API configuration.
  pub api: ApiConfig,
  /// External platform endpoints and client tuning.
  pub social: SocialConfig,
  /// State machine timing parameters.
  pub orchestrator: OrchestratorConfig,
  /// Bot registry entries, one per bot account.
  pub bots: Vec<BotEntry>,
  /// Metrics and monitoring.
  pub metrics: MetricsConfig,
  /// Persistence configuration.
  pub persistence: PersistenceConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Bind address for the bot-trading API.
  #[serde(default = "default_api_addr")]
  pub bind_address: String,
}

/// External platform client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SocialConfig {
  /// Users (username resolution) API base URL.
  pub users_base_url: String,
  /// Friends (friendship status) API base URL.
  pub friends_base_url: String,
  /// Thumbnails (avatar) API base URL.
  pub thumbnails_base_url: String,
  /// Request timeout in milliseconds.
  #[serde(default = "default_social_timeout_ms")]
  pub timeout_ms: u64,
  /// Maximum concurrent platform requests.
  #[serde(default = "default_max_concurrent")]
  pub max_concurrent: usize,
  /// Maximum retries on transient errors.
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  /// Base delay between retries in milliseconds (exponential backoff).
  #[serde(default = "default_retry_base_delay_ms")]
  pub retry_base_delay_ms: u64,
}

/// State machine timing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
  /// Hard deadline for friendship confirmation, in seconds.
  #[serde(default = "default_confirmation_timeout")]
  pub confirmation_timeout_secs: u64,
  /// First friendship poll delay in milliseconds.
  #[serde(default = "default_poll_initial_ms")]
  pub poll_initial_delay_ms: u64,
  /// Upper bound on a single poll delay, in seconds.
  #[serde(default = "default_poll_cap")]
  pub poll_max_delay_secs: u64,
  /// Expiry sweep interval in seconds.
  #[serde(default = "default_sweep_interval")]
  pub sweep_interval_secs: u64,
}

/// One bot registry entry.
///
/// The registry is static: entries are only read at startup. Flipping
/// `online` requires a restart, matching the original deployment model.
#[derive(Debug, Clone, Deserialize)]
pub struct BotEntry {
  /// Registry identifier, referenced by requests and metrics.
  pub id: String,
  /// Platform username.
  pub username: String,
  /// Platform numeric user ID.
  pub user_id: u64,
  /// Game (universe) ID this bot serves.
  pub game_id: String,
  /// Maximum concurrent requests.
  #[serde(default = "default_bot_capacity")]
  pub capacity: u32,
  /// Whether the bot is selectable.
  #[serde(default = "default_true")]
  pub online: bool,
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
  /// Directory for the JSONL request journal.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_api_addr() -> String {
  "0.0.0.0:8080".to_string()
}

fn default_social_timeout_ms() -> u64 {
  10_000
}

fn default_max_concurrent() -> usize {
  10
}

fn default_max_retries() -> u32 {
  3
}

fn default_retry_base_delay_ms() -> u64 {
  200
}

fn default_confirmation_timeout() -> u64 {
  600
}

fn default_poll_initial_ms() -> u64 {
  2_000
}

fn default_poll_cap() -> u64 {
  30
}

fn default_sweep_interval() -> u64 {
  15
}

fn default_bot_capacity() -> u32 {
  3
}

fn default_true() -> bool {
  true
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8081
}

fn default_data_dir() -> String {
  "data".to_string()
}
