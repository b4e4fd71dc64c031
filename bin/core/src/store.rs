use anyhow::Context;
use smelter_client::entities::build::BuildConfig;

use crate::config::core_config;

/// Read access to build configs. Fetched fresh on every webhook
/// call, never cached across requests.
pub trait BuildConfigStore {
  async fn get(
    &self,
    namespace: &str,
    name: &str,
  ) -> anyhow::Result<BuildConfig>;
}

/// Read access to named webhook secrets referenced by trigger
/// `secret_ref`. Fetched fresh on every webhook call.
pub trait SecretStore {
  async fn get(
    &self,
    namespace: &str,
    name: &str,
  ) -> anyhow::Result<String>;
}

/// Build configs declared in the core config file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigBuildConfigs;

impl BuildConfigStore for ConfigBuildConfigs {
  async fn get(
    &self,
    namespace: &str,
    name: &str,
  ) -> anyhow::Result<BuildConfig> {
    core_config()
      .build_configs
      .iter()
      .find(|config| {
        config.namespace == namespace && config.name == name
      })
      .cloned()
      .with_context(|| {
        format!("no build config matching {namespace}/{name}")
      })
  }
}

/// Secrets declared in the core config file.
/// Config-declared secrets are server wide, the namespace only
/// scopes store implementations with real multi tenancy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigSecrets;

impl SecretStore for ConfigSecrets {
  async fn get(
    &self,
    _namespace: &str,
    name: &str,
  ) -> anyhow::Result<String> {
    core_config()
      .secrets
      .get(name)
      .cloned()
      .with_context(|| format!("no secret matching {name}"))
  }
}
