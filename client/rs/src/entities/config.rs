//! # Configuring the Smelter Core API
//!
//! Smelter Core is configured by parsing a base configuration file
//! ([CoreConfig]), and overriding any fields given in the file with
//! ones provided on the environment ([Env]).
//!
//! The recommended method for running Smelter Core is via the docker
//! image, which carries a default configuration file at
//! `/config/config.toml`. Any custom configuration can be mounted
//! there, or provided on the environment alone.

use std::{collections::HashMap, path::PathBuf};

use serde::Deserialize;

use crate::entities::{
  build::BuildConfig,
  empty_or_redacted,
  logger::{LogConfig, LogLevel, StdioLogMode},
};

/// # Smelter Core Environment Variables
///
/// You can override any field of the [CoreConfig] by passing the
/// associated environment variable. The variables should be passed in
/// the traditional `UPPER_SNAKE_CASE` format, although the lower case
/// format can still be parsed.
#[derive(Debug, Clone, Deserialize)]
pub struct Env {
  /// Specify a custom config path for the core config toml.
  /// Default: `/config/config.toml`
  #[serde(default = "default_config_path")]
  pub smelter_config_path: PathBuf,

  /// Override `port`
  pub smelter_port: Option<u16>,
  /// Override `bind_ip`
  pub smelter_bind_ip: Option<String>,
  /// Override `namespace`
  pub smelter_namespace: Option<String>,

  /// Override `builder_url`
  pub smelter_builder_url: Option<String>,
  /// Override `builder_passkey`
  pub smelter_builder_passkey: Option<String>,
  /// Override `builder_passkey` with file
  pub smelter_builder_passkey_file: Option<PathBuf>,

  /// Override `logging.level`
  pub smelter_logging_level: Option<LogLevel>,
  /// Override `logging.stdio`
  pub smelter_logging_stdio: Option<StdioLogMode>,
  /// Override `logging.pretty`
  pub smelter_logging_pretty: Option<bool>,
  /// Override `logging.otlp_endpoint`
  pub smelter_logging_otlp_endpoint: Option<String>,
  /// Override `logging.opentelemetry_service_name`
  pub smelter_logging_opentelemetry_service_name: Option<String>,

  /// Override `pretty_startup_config`
  pub smelter_pretty_startup_config: Option<bool>,

  /// Override `ssl_enabled`
  pub smelter_ssl_enabled: Option<bool>,
  /// Override `ssl_key_file`
  pub smelter_ssl_key_file: Option<PathBuf>,
  /// Override `ssl_cert_file`
  pub smelter_ssl_cert_file: Option<PathBuf>,
}

fn default_config_path() -> PathBuf {
  PathBuf::from("/config/config.toml")
}

/// # Smelter Core Config
#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
  /// The port the core system will run on.
  /// Default: `9120`
  #[serde(default = "default_core_port")]
  pub port: u16,

  /// The IP address the core server binds to.
  /// Default: `[::]`
  #[serde(default = "default_bind_ip")]
  pub bind_ip: String,

  /// The namespace webhook calls resolve build configs in.
  /// Default: `default`
  #[serde(default = "super::build::default_namespace")]
  pub namespace: String,

  /// Address of a downstream builder to forward instantiated
  /// build requests to. When empty, builds are instantiated
  /// locally (identity assigned and logged) without handoff.
  #[serde(default)]
  pub builder_url: String,

  /// Passkey sent to the downstream builder on forward.
  #[serde(default)]
  pub builder_passkey: String,

  /// Logging configuration
  #[serde(default)]
  pub logging: LogConfig,

  /// Pretty format the startup config echo.
  #[serde(default)]
  pub pretty_startup_config: bool,

  /// Whether to enable ssl.
  #[serde(default)]
  pub ssl_enabled: bool,

  /// Path to the ssl key.
  /// Default: `/config/ssl/key.pem`.
  #[serde(default = "default_ssl_key_file")]
  pub ssl_key_file: PathBuf,

  /// Path to the ssl cert.
  /// Default: `/config/ssl/cert.pem`.
  #[serde(default = "default_ssl_cert_file")]
  pub ssl_cert_file: PathBuf,

  /// The build configs the listener can trigger.
  /// These can NOT be overridden on the environment.
  #[serde(default, alias = "build_config")]
  pub build_configs: Vec<BuildConfig>,

  /// Named webhook secrets, referenced by trigger `secret_ref`.
  /// These can NOT be overridden on the environment.
  #[serde(default)]
  pub secrets: HashMap<String, String>,
}

fn default_core_port() -> u16 {
  9120
}

fn default_bind_ip() -> String {
  String::from("[::]")
}

fn default_ssl_key_file() -> PathBuf {
  PathBuf::from("/config/ssl/key.pem")
}

fn default_ssl_cert_file() -> PathBuf {
  PathBuf::from("/config/ssl/cert.pem")
}

impl Default for CoreConfig {
  fn default() -> Self {
    Self {
      port: default_core_port(),
      bind_ip: default_bind_ip(),
      namespace: super::build::default_namespace(),
      builder_url: Default::default(),
      builder_passkey: Default::default(),
      logging: Default::default(),
      pretty_startup_config: Default::default(),
      ssl_enabled: Default::default(),
      ssl_key_file: default_ssl_key_file(),
      ssl_cert_file: default_ssl_cert_file(),
      build_configs: Default::default(),
      secrets: Default::default(),
    }
  }
}

impl CoreConfig {
  /// The config with all secret values redacted,
  /// for the startup echo.
  pub fn sanitized(&self) -> CoreConfig {
    let mut config = self.clone();

    config.builder_passkey =
      empty_or_redacted(&config.builder_passkey);
    config.secrets = config
      .secrets
      .into_iter()
      .map(|(name, secret)| (name, empty_or_redacted(&secret)))
      .collect();
    for build_config in &mut config.build_configs {
      for trigger in &mut build_config.triggers {
        trigger.secret = empty_or_redacted(&trigger.secret);
      }
    }

    config
  }
}
