use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use typeshare::typeshare;

use super::{EnvironmentVar, I64};

/// A buildable unit. Owns the webhook triggers which authorize
/// externally initiated builds of it.
///
/// Build configs are declared in the core config file and are
/// read-only snapshots for the duration of a single webhook call.
#[typeshare]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
  /// The build config name.
  /// Must be unique within its namespace.
  pub name: String,

  /// The namespace the build config lives in.
  #[serde(default = "default_namespace")]
  pub namespace: String,

  /// Default git source to build when the webhook payload
  /// carries no revision.
  #[serde(default)]
  pub source: GitSource,

  /// Webhook triggers, in declaration order.
  /// First-declared triggers are checked first when multiple
  /// secrets are configured for the same hook type.
  #[serde(default)]
  pub triggers: Vec<WebhookTrigger>,

  /// Default build environment. Request env overrides are
  /// appended after these by the instantiator.
  #[serde(default)]
  pub env: Vec<EnvironmentVar>,
}

pub fn default_namespace() -> String {
  String::from("default")
}

#[typeshare]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitSource {
  /// Clone url of the repo, eg `https://github.com/example/site`.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub repo: String,

  /// Branch to build when no revision comes in on the hook.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub branch: String,
}

/// A secret-protected authorization on a [BuildConfig] permitting
/// webhook-initiated builds of a given hook type.
///
/// Exactly one of `secret` / `secret_ref` should be set.
/// A trigger with neither is never matchable.
#[typeshare]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookTrigger {
  /// Which provider payload format this trigger accepts.
  pub hook_type: HookType,

  /// The secret checked against the url segment, stored inline.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub secret: String,

  /// Name of a secret in the secret store to check instead of
  /// an inline value. Resolved freshly on every call.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub secret_ref: String,

  /// Allow the webhook payload to set env vars on the build.
  /// Only the generic hook carries env; when this is false any
  /// env in the payload is dropped with a warning.
  #[serde(default)]
  pub allow_env: bool,
}

/// The provider payload formats the webhook listener understands.
#[typeshare]
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HookType {
  #[default]
  Generic,
  Github,
  Gitlab,
}

/// Who authored / committed the revision.
#[typeshare]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitUser {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub name: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub email: String,
}

/// An opaque pointer to the source state that should be built,
/// as extracted from a provider payload.
#[typeshare]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitRevision {
  /// Full commit hash.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub commit: String,

  /// The git ref the commit landed on, eg `refs/heads/main`.
  #[serde(
    default,
    rename = "ref",
    skip_serializing_if = "String::is_empty"
  )]
  pub reference: String,

  #[serde(default, skip_serializing_if = "GitUser::is_empty")]
  pub author: GitUser,

  #[serde(default, skip_serializing_if = "GitUser::is_empty")]
  pub committer: GitUser,

  /// Commit message headline.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub message: String,
}

impl GitUser {
  pub fn is_empty(&self) -> bool {
    self.name.is_empty() && self.email.is_empty()
  }
}

impl GitRevision {
  pub fn is_empty(&self) -> bool {
    self.commit.is_empty()
      && self.reference.is_empty()
      && self.message.is_empty()
      && self.author.is_empty()
      && self.committer.is_empty()
  }
}

/// Container build overrides a payload may carry on the
/// generic hook.
#[typeshare]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DockerStrategyOptions {
  /// Additional --build-arg pairs.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub build_args: Vec<EnvironmentVar>,

  /// Force a no-cache build.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub no_cache: Option<bool>,
}

/// Provenance record attached to an instantiated build explaining
/// what external event caused its creation. Never edited after
/// creation.
#[typeshare]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildTriggerCause {
  /// Human readable cause, eg `GitHub WebHook`.
  pub message: String,

  /// The hook type which produced the build.
  pub hook_type: HookType,

  /// The revision the hook carried, if any.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub revision: Option<GitRevision>,
}

impl BuildTriggerCause {
  pub fn from_hook(
    hook_type: HookType,
    revision: Option<GitRevision>,
  ) -> BuildTriggerCause {
    let message = match hook_type {
      HookType::Generic => "Generic WebHook",
      HookType::Github => "GitHub WebHook",
      HookType::Gitlab => "GitLab WebHook",
    };
    BuildTriggerCause {
      message: message.to_string(),
      hook_type,
      revision,
    }
  }
}

/// The unit handed to the build instantiator. Consumed exactly
/// once; the instantiator applies the build config's own defaults
/// beneath these overrides.
#[typeshare]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildRequest {
  /// Name of the target [BuildConfig].
  pub build_config: String,

  /// Provenance of this request.
  #[serde(default)]
  pub triggered_by: Vec<BuildTriggerCause>,

  /// Revision to build. None means build the config's default
  /// source.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub revision: Option<GitRevision>,

  /// Env overrides, appended after the config's own env.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub env: Vec<EnvironmentVar>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub docker_strategy_options: Option<DockerStrategyOptions>,
}

/// A single instantiated build run.
#[typeshare]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Build {
  /// Unique id assigned at instantiation.
  pub id: String,

  /// `{build_config}-{short id}`.
  pub name: String,

  #[serde(default = "default_namespace")]
  pub namespace: String,

  /// The build config this build was instantiated from.
  pub build_config: String,

  /// The source the build will check out.
  #[serde(default)]
  pub source: GitSource,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub revision: Option<GitRevision>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub env: Vec<EnvironmentVar>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub docker_strategy_options: Option<DockerStrategyOptions>,

  #[serde(default)]
  pub triggered_by: Vec<BuildTriggerCause>,

  /// When the build was instantiated.
  #[serde(default)]
  pub created_at: I64,
}

/// Body returned by the webhook listener on success.
/// `build` is None when the provider event was intentionally
/// ignored (eg a ping).
#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookResponse {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build: Option<Build>,

  /// Non fatal provider-specific caveat, eg `env vars ignored`.
  /// Informational only, does not alter the success status.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub warning: Option<String>,
}
