use std::{path::PathBuf, sync::OnceLock};

use anyhow::Context;
use colored::Colorize;
use smelter_client::entities::{
  config::{CoreConfig, Env},
  logger::LogConfig,
};

pub fn core_config() -> &'static CoreConfig {
  static CORE_CONFIG: OnceLock<CoreConfig> = OnceLock::new();
  CORE_CONFIG.get_or_init(|| {
    let env: Env = match envy::from_env()
      .context("Failed to parse Smelter Core environment")
    {
      Ok(env) => env,
      Err(e) => {
        panic!("{e:?}");
      }
    };

    let config_path = &env.smelter_config_path;
    let config = if config_path.is_file() {
      let contents = std::fs::read_to_string(config_path)
        .with_context(|| {
          format!("Failed to read config file at {config_path:?}")
        })
        .unwrap_or_else(|e| panic!("{e:?}"));
      toml::from_str::<CoreConfig>(&contents)
        .with_context(|| {
          format!("Failed to parse config file at {config_path:?}")
        })
        .unwrap_or_else(|e| panic!("{e:?}"))
    } else {
      println!(
        "{}: No config file at {config_path:?}, using default config",
        "INFO".green(),
      );
      CoreConfig::default()
    };

    // recreating CoreConfig here makes sure all env overrides applied.
    CoreConfig {
      // Secret things overridden with file
      builder_passkey: maybe_read_item_from_file(
        env.smelter_builder_passkey_file,
        env.smelter_builder_passkey,
      )
      .unwrap_or(config.builder_passkey),

      // Non secrets
      port: env.smelter_port.unwrap_or(config.port),
      bind_ip: env.smelter_bind_ip.unwrap_or(config.bind_ip),
      namespace: env.smelter_namespace.unwrap_or(config.namespace),
      builder_url: env
        .smelter_builder_url
        .unwrap_or(config.builder_url),
      logging: LogConfig {
        level: env
          .smelter_logging_level
          .unwrap_or(config.logging.level),
        stdio: env
          .smelter_logging_stdio
          .unwrap_or(config.logging.stdio),
        pretty: env
          .smelter_logging_pretty
          .unwrap_or(config.logging.pretty),
        otlp_endpoint: env
          .smelter_logging_otlp_endpoint
          .unwrap_or(config.logging.otlp_endpoint),
        opentelemetry_service_name: env
          .smelter_logging_opentelemetry_service_name
          .unwrap_or(config.logging.opentelemetry_service_name),
      },
      pretty_startup_config: env
        .smelter_pretty_startup_config
        .unwrap_or(config.pretty_startup_config),
      ssl_enabled: env.smelter_ssl_enabled.unwrap_or(config.ssl_enabled),
      ssl_key_file: env.smelter_ssl_key_file.unwrap_or(config.ssl_key_file),
      ssl_cert_file: env.smelter_ssl_cert_file.unwrap_or(config.ssl_cert_file),

      // These can't be overridden on env
      build_configs: config.build_configs,
      secrets: config.secrets,
    }
  })
}

/// File contents take precedence over the plain env var.
fn maybe_read_item_from_file(
  file: Option<PathBuf>,
  item: Option<String>,
) -> Option<String> {
  if let Some(path) = file {
    match std::fs::read_to_string(&path) {
      Ok(contents) => {
        let contents = contents.trim().to_string();
        if !contents.is_empty() {
          return Some(contents);
        }
      }
      Err(e) => {
        eprintln!(
          "{}: Failed to read contents of {path:?} | {e:?}",
          "ERROR".red(),
        );
      }
    }
  }
  item
}
