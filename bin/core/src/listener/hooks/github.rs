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

/// Push events from GitHub (and Gogs, which speaks the same
/// payload under its own event header).
pub struct Github;

#[derive(Debug, Deserialize)]
struct PushPayload {
  #[serde(default, rename = "ref")]
  reference: String,
  #[serde(default)]
  after: String,
  #[serde(default)]
  head_commit: Option<HeadCommit>,
}

#[derive(Debug, Deserialize)]
struct HeadCommit {
  #[serde(default)]
  message: String,
  #[serde(default)]
  author: Option<GitUser>,
  #[serde(default)]
  committer: Option<GitUser>,
}

impl HookPlugin for Github {
  fn hook_triggers(
    &self,
    config: &BuildConfig,
  ) -> anyhow::Result<Vec<WebhookTrigger>> {
    verify::matchable_triggers(config, HookType::Github)
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
    if trigger.hook_type != HookType::Github {
      return Err(HookError::HookNotEnabled);
    }

    let event = header_string(&req.headers, "x-github-event")
      .or_else(|| header_string(&req.headers, "x-gogs-event"))
      .ok_or_else(|| {
        HookError::Status(
          anyhow!("missing X-GitHub-Event or X-Gogs-Event header")
            .status_code(StatusCode::BAD_REQUEST),
        )
      })?;

    match event.as_str() {
      // Sent on hook creation to test the endpoint,
      // acknowledged without a build.
      "ping" => Ok(Extraction::Ignore),
      "push" => {
        let payload: PushPayload =
          serde_json::from_slice(&req.body).map_err(|e| {
            HookError::Status(
              anyhow!("error parsing push payload | {e}")
                .status_code(StatusCode::BAD_REQUEST),
            )
          })?;
        let head = payload.head_commit.unwrap_or(HeadCommit {
          message: Default::default(),
          author: None,
          committer: None,
        });
        let revision = GitRevision {
          commit: payload.after,
          reference: payload.reference,
          author: head.author.unwrap_or_default(),
          committer: head.committer.unwrap_or_default(),
          message: head.message,
        };
        Ok(Extraction::Build {
          revision: Some(revision),
          env: Vec::new(),
          docker_strategy_options: None,
          warning: None,
        })
      }
      unknown => Err(HookError::Status(
        anyhow!("Unknown X-GitHub-Event or X-Gogs-Event {unknown}")
          .status_code(StatusCode::BAD_REQUEST),
      )),
    }
  }
}
