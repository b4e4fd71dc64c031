use anyhow::anyhow;
use axum::http::{Method, StatusCode};
use serde::Deserialize;
use serror::AddStatusCodeError;
use smelter_client::entities::build::{
  BuildConfig, GitRevision, GitUser, HookType, WebhookTrigger,
};

use crate::listener::verify;

use super::{
  Extraction, HookError, HookPlugin, HookRequest, header_string,
};

/// Push Hook events from GitLab.
pub struct Gitlab;

#[derive(Debug, Deserialize)]
struct PushPayload {
  #[serde(default, rename = "ref")]
  reference: String,
  #[serde(default)]
  after: String,
  #[serde(default)]
  commits: Vec<Commit>,
}

#[derive(Debug, Deserialize)]
struct Commit {
  #[serde(default)]
  id: String,
  #[serde(default)]
  message: String,
  #[serde(default)]
  author: Option<GitUser>,
}

impl HookPlugin for Gitlab {
  fn hook_triggers(
    &self,
    config: &BuildConfig,
  ) -> anyhow::Result<Vec<WebhookTrigger>> {
    verify::matchable_triggers(config, HookType::Gitlab)
  }

  fn extract(
    &self,
    _config: &BuildConfig,
    trigger: &WebhookTrigger,
    req: &HookRequest,
  ) -> Result<Extraction, HookError> {
    if req.method != Method::POST {
      return Err(HookError::MethodNotSupported(req.method.clone()));
    }
    if trigger.hook_type != HookType::Gitlab {
      return Err(HookError::HookNotEnabled);
    }

    let event = header_string(&req.headers, "x-gitlab-event")
      .ok_or_else(|| {
        HookError::Status(
          anyhow!("missing X-Gitlab-Event header")
            .status_code(StatusCode::BAD_REQUEST),
        )
      })?;
    if event != "Push Hook" {
      return Err(HookError::Status(
        anyhow!("Unknown X-Gitlab-Event {event}")
          .status_code(StatusCode::BAD_REQUEST),
      ));
    }

    let payload: PushPayload = serde_json::from_slice(&req.body)
      .map_err(|e| {
        HookError::Status(
          anyhow!("error parsing push payload | {e}")
            .status_code(StatusCode::BAD_REQUEST),
        )
      })?;

    // GitLab carries the pushed commits as a list, the head is
    // the one matching `after`, falling back to the last.
    let head = payload
      .commits
      .iter()
      .find(|commit| commit.id == payload.after)
      .or(payload.commits.last());
    let (author, message) = match head {
      Some(commit) => (
        commit.author.clone().unwrap_or_default(),
        commit.message.clone(),
      ),
      None => (GitUser::default(), String::new()),
    };

    let revision = GitRevision {
      commit: payload.after,
      reference: payload.reference,
      author,
      committer: GitUser::default(),
      message,
    };

    Ok(Extraction::Build {
      revision: Some(revision),
      env: Vec::new(),
      docker_strategy_options: None,
      warning: None,
    })
  }
}
