use std::sync::OnceLock;

use anyhow::Context;
use axum::http::HeaderValue;
use logger::LogConfig;
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_http::cors::CorsLayer;

/// Ceiling latency (ms) used both as the unknown-region-pair fallback and
/// as the normalizer in `locality_score`.
pub const MAX_LATENCY_MS: f64 = 200.0;

/// Inter-region latency, in milliseconds, symmetric and including the
/// same-region diagonal. Used only to seed the scheduler's locality
/// score; real measured latency would replace this in a production
/// deployment.
pub const REGION_LATENCY_MATRIX: &[(&str, &str, f64)] = &[
  ("us-east", "us-east", 5.0),
  ("us-east", "us-west", 45.0),
  ("us-east", "eu-west", 80.0),
  ("us-east", "eu-central", 90.0),
  ("us-east", "ap-south", 180.0),
  ("us-east", "ap-northeast", 150.0),
  ("us-west", "us-west", 5.0),
  ("us-west", "eu-west", 120.0),
  ("us-west", "eu-central", 130.0),
  ("us-west", "ap-south", 160.0),
  ("us-west", "ap-northeast", 100.0),
  ("eu-west", "eu-west", 5.0),
  ("eu-west", "eu-central", 15.0),
  ("eu-west", "ap-south", 120.0),
  ("eu-west", "ap-northeast", 200.0),
  ("eu-central", "eu-central", 5.0),
  ("eu-central", "ap-south", 100.0),
  ("eu-central", "ap-northeast", 180.0),
  ("ap-south", "ap-south", 5.0),
  ("ap-south", "ap-northeast", 80.0),
  ("ap-northeast", "ap-northeast", 5.0),
];

/// Looks up the latency between two regions. A pair absent from the
/// matrix (an unknown region) falls back to `MAX_LATENCY_MS`.
pub fn region_latency_ms(a: &str, b: &str) -> f64 {
  REGION_LATENCY_MATRIX
    .iter()
    .find(|(x, y, _)| (x == &a && y == &b) || (x == &b && y == &a))
    .map(|(_, _, ms)| *ms)
    .unwrap_or(MAX_LATENCY_MS)
}

/// Environment-variable shape, parsed with `envy`. Every field maps to
/// `FOG_<SCREAMING_SNAKE_CASE>` unless overridden by `#[serde(rename)]`.
#[derive(Debug, Deserialize)]
struct Env {
  #[serde(default = "default_bind_address")]
  fog_bind_address: String,
  #[serde(default)]
  fog_database_uri: Option<String>,
  #[serde(default = "default_db_name")]
  fog_database_db_name: String,
  #[serde(default)]
  fog_docker_enabled: bool,
  #[serde(default = "default_true")]
  fog_mock_fallback_on_runtime_error: bool,
  #[serde(default = "default_staking_apy")]
  fog_staking_apy_percent: Decimal,
  #[serde(default = "default_runtime_reward_rate")]
  fog_runtime_reward_rate_per_hour: Decimal,
  #[serde(default)]
  fog_cors_allowed_origins: Vec<String>,
  #[serde(default)]
  fog_log_level: Option<String>,
  #[serde(default)]
  fog_log_stdio: Option<String>,
}

fn default_bind_address() -> String {
  "0.0.0.0:9120".to_string()
}

fn default_db_name() -> String {
  "fog_core".to_string()
}

fn default_true() -> bool {
  true
}

fn default_staking_apy() -> Decimal {
  Decimal::new(8, 0) // 8% APY
}

fn default_runtime_reward_rate() -> Decimal {
  Decimal::new(5, 2) // 0.05 per replica-hour
}

/// Fully resolved application configuration. Built once at startup via
/// [`app_config`] and never mutated afterward.
#[derive(Debug, Clone)]
pub struct AppConfig {
  pub bind_address: String,
  /// `None` means run against the in-memory persistence port instead of
  /// MongoDB - used for local development and the test suite.
  pub database_uri: Option<String>,
  pub database_db_name: String,
  /// Whether to use the real Docker-backed container runtime. When
  /// `false`, or when Docker is enabled but unreachable and
  /// `mock_fallback_on_runtime_error` is set, the mock runtime is used.
  pub docker_enabled: bool,
  pub mock_fallback_on_runtime_error: bool,
  /// Annual percentage yield applied to staking rewards at settlement.
  pub staking_apy_percent: Decimal,
  /// Reward paid out per replica-hour of successful runtime.
  pub runtime_reward_rate_per_hour: Decimal,
  pub cors_allowed_origins: Vec<String>,
  pub log: LogConfig,
}

impl AppConfig {
  fn from_env(env: Env) -> anyhow::Result<Self> {
    let mut log = LogConfig::default();
    if let Some(level) = env.fog_log_level {
      log.level = level
        .parse()
        .context("invalid FOG_LOG_LEVEL")?;
    }
    if let Some(stdio) = env.fog_log_stdio {
      log.stdio = stdio.parse().context("invalid FOG_LOG_STDIO")?;
    }
    Ok(Self {
      bind_address: env.fog_bind_address,
      database_uri: env.fog_database_uri,
      database_db_name: env.fog_database_db_name,
      docker_enabled: env.fog_docker_enabled,
      mock_fallback_on_runtime_error: env
        .fog_mock_fallback_on_runtime_error,
      staking_apy_percent: env.fog_staking_apy_percent,
      runtime_reward_rate_per_hour: env
        .fog_runtime_reward_rate_per_hour,
      cors_allowed_origins: env.fog_cors_allowed_origins,
      log,
    })
  }

  pub fn cors_layer(&self) -> CorsLayer {
    let allowed_origins = if self.cors_allowed_origins.is_empty() {
      vec![HeaderValue::from_static("*")]
    } else {
      self
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect()
    };
    CorsLayer::new()
      .allow_origin(allowed_origins)
      .allow_methods(tower_http::cors::Any)
      .allow_headers(tower_http::cors::Any)
  }
}

/// Loads configuration from the process environment (via `dotenvy` +
/// `envy`) exactly once and returns a shared reference to it.
pub fn app_config() -> &'static AppConfig {
  static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();
  APP_CONFIG.get_or_init(|| {
    let env: Env = envy::from_env()
      .context("failed to parse fog-core environment")
      .unwrap();
    AppConfig::from_env(env)
      .context("failed to build AppConfig")
      .unwrap()
  })
}
