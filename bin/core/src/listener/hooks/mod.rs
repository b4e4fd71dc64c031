use std::{collections::HashMap, sync::OnceLock};

use axum::{
  body::Bytes,
  http::{HeaderMap, Method},
};
use smelter_client::entities::{
  EnvironmentVar,
  build::{
    BuildConfig, DockerStrategyOptions, GitRevision, HookType,
    WebhookTrigger,
  },
};

mod generic;
mod github;
mod gitlab;

pub use generic::Generic;
pub use github::Github;
pub use gitlab::Gitlab;

/// The inbound call as hook plugins see it.
/// Derived once per http request, immutable.
pub struct HookRequest {
  pub method: Method,
  pub headers: HeaderMap,
  pub body: Bytes,
}

/// What a plugin made of the request.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
  /// Instantiate a build.
  Build {
    /// Revision to build. None means the config's default source.
    revision: Option<GitRevision>,
    /// Env overrides from the payload, already gated on the
    /// trigger's `allow_env`.
    env: Vec<EnvironmentVar>,
    docker_strategy_options: Option<DockerStrategyOptions>,
    /// Non fatal caveat to surface to the caller on success.
    warning: Option<String>,
  },
  /// The provider event is intentionally not a trigger
  /// (eg a ping / test delivery). Not an error.
  Ignore,
}

/// The closed set of extraction failures. The dispatcher folds
/// `SecretMismatch` / `HookNotEnabled` into the uniform
/// unauthorized outcome, maps `MethodNotSupported` to 405, passes
/// `Status` through verbatim, and wraps anything else as an
/// internal error.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
  #[error("secret mismatch")]
  SecretMismatch,
  #[error("hook is not enabled")]
  HookNotEnabled,
  #[error("the method {0} is not supported")]
  MethodNotSupported(Method),
  /// An already-structured client error.
  #[error("{}", .0.error)]
  Status(serror::Error),
  #[error(transparent)]
  Other(#[from] anyhow::Error),
}

/// One implementation per provider payload format. Both methods
/// are pure parsing, no shared state between plugins.
pub trait HookPlugin {
  /// Filter / validate the config's triggers for this hook type,
  /// ahead of secret checking.
  fn hook_triggers(
    &self,
    config: &BuildConfig,
  ) -> anyhow::Result<Vec<WebhookTrigger>>;

  /// Parse the request into a revision and overrides.
  fn extract(
    &self,
    config: &BuildConfig,
    trigger: &WebhookTrigger,
    req: &HookRequest,
  ) -> Result<Extraction, HookError>;
}

pub type HookRegistry =
  HashMap<HookType, Box<dyn HookPlugin + Send + Sync>>;

/// The hook plugins served by this process. Built once before
/// serving begins and never mutated after, safe for
/// unsynchronized concurrent reads.
pub fn default_hooks() -> &'static HookRegistry {
  static HOOKS: OnceLock<HookRegistry> = OnceLock::new();
  HOOKS.get_or_init(|| {
    let mut hooks: HookRegistry = HashMap::new();
    hooks.insert(HookType::Generic, Box::new(Generic));
    hooks.insert(HookType::Github, Box::new(Github));
    hooks.insert(HookType::Gitlab, Box::new(Gitlab));
    hooks
  })
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
  headers
    .get(name)
    .and_then(|value| value.to_str().ok())
    .map(str::trim)
    .filter(|value| !value.is_empty())
    .map(ToString::to_string)
}
