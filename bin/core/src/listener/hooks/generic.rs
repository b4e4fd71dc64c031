use anyhow::anyhow;
use axum::http::{Method, StatusCode};
use serde::Deserialize;
use serror::AddStatusCodeError;
use smelter_client::entities::{
  EnvironmentVar,
  build::{
    BuildConfig, DockerStrategyOptions, GitRevision, HookType,
    WebhookTrigger,
  },
};

use crate::listener::verify;

use super::{
  Extraction, HookError, HookPlugin, HookRequest, header_string,
};

/// The provider-agnostic hook. Any system able to POST a url can
/// use it, the payload is optional.
pub struct Generic;

/// Everything in the payload is optional, an empty body is a
/// valid trigger of the config's default source.
#[derive(Debug, Default, Deserialize)]
struct GenericPayload {
  #[serde(default)]
  git: Option<GitRevision>,
  #[serde(default)]
  env: Vec<EnvironmentVar>,
  #[serde(default)]
  docker_strategy_options: Option<DockerStrategyOptions>,
}

impl HookPlugin for Generic {
  fn hook_triggers(
    &self,
    config: &BuildConfig,
  ) -> anyhow::Result<Vec<WebhookTrigger>> {
    verify::matchable_triggers(config, HookType::Generic)
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
    if trigger.hook_type != HookType::Generic {
      return Err(HookError::HookNotEnabled);
    }

    if req.body.is_empty() {
      return Ok(Extraction::Build {
        revision: None,
        env: Vec::new(),
        docker_strategy_options: None,
        warning: None,
      });
    }

    let content_type =
      header_string(&req.headers, "content-type").unwrap_or_default();
    let payload: GenericPayload = if is_yaml(&content_type) {
      serde_yaml_ng::from_slice(&req.body).map_err(|e| {
        HookError::Status(
          anyhow!("unable to parse yaml payload | {e}")
            .status_code(StatusCode::BAD_REQUEST),
        )
      })?
    } else if content_type.is_empty()
      || content_type.starts_with("application/json")
    {
      serde_json::from_slice(&req.body).map_err(|e| {
        HookError::Status(
          anyhow!("unable to parse json payload | {e}")
            .status_code(StatusCode::BAD_REQUEST),
        )
      })?
    } else {
      // Trigger the build anyway and say the payload was skipped,
      // matching the empty body behavior.
      return Ok(Extraction::Build {
        revision: None,
        env: Vec::new(),
        docker_strategy_options: None,
        warning: Some(format!(
          "payload ignored: unsupported Content-Type {content_type}"
        )),
      });
    };

    let mut warning = None;
    let env = if payload.env.is_empty() || trigger.allow_env {
      payload.env
    } else {
      warning = Some(String::from("env vars ignored"));
      Vec::new()
    };

    Ok(Extraction::Build {
      revision: payload.git.filter(|git| !git.is_empty()),
      env,
      docker_strategy_options: payload.docker_strategy_options,
      warning,
    })
  }
}

fn is_yaml(content_type: &str) -> bool {
  content_type.starts_with("application/yaml")
    || content_type.starts_with("application/x-yaml")
    || content_type.starts_with("text/yaml")
}

#[cfg(test)]
mod tests {
  use axum::http::Method;

  use super::{super::test_utils::*, *};

  fn trigger(allow_env: bool) -> WebhookTrigger {
    WebhookTrigger {
      hook_type: HookType::Generic,
      secret: String::from("abc"),
      allow_env,
      ..Default::default()
    }
  }

  #[test]
  fn empty_body_proceeds_without_revision() {
    let extraction = Generic
      .extract(
        &Default::default(),
        &trigger(false),
        &post_request(&[], ""),
      )
      .unwrap();
    assert_eq!(
      extraction,
      Extraction::Build {
        revision: None,
        env: Vec::new(),
        docker_strategy_options: None,
        warning: None,
      }
    );
  }

  #[test]
  fn rejects_non_post_methods() {
    let err = Generic
      .extract(
        &Default::default(),
        &trigger(false),
        &request(Method::GET, &[], ""),
      )
      .unwrap_err();
    assert!(matches!(err, HookError::MethodNotSupported(_)));
  }

  #[test]
  fn wrong_trigger_type_is_not_enabled() {
    let github_trigger = WebhookTrigger {
      hook_type: HookType::Github,
      secret: String::from("abc"),
      ..Default::default()
    };
    let err = Generic
      .extract(
        &Default::default(),
        &github_trigger,
        &post_request(&[], ""),
      )
      .unwrap_err();
    assert!(matches!(err, HookError::HookNotEnabled));
  }

  #[test]
  fn parses_json_payload_revision() {
    let body = r#"{
      "git": {
        "commit": "9bd2dd4a1a7a35b1cbb6f83b9c046a2e75958757",
        "ref": "refs/heads/main",
        "message": "add the thing"
      }
    }"#;
    let extraction = Generic
      .extract(
        &Default::default(),
        &trigger(false),
        &post_request(
          &[("content-type", "application/json")],
          body,
        ),
      )
      .unwrap();
    let Extraction::Build {
      revision: Some(revision),
      warning: None,
      ..
    } = extraction
    else {
      panic!("expected build with revision, got {extraction:?}");
    };
    assert_eq!(
      revision.commit,
      "9bd2dd4a1a7a35b1cbb6f83b9c046a2e75958757"
    );
    assert_eq!(revision.reference, "refs/heads/main");
  }

  #[test]
  fn parses_yaml_payload_equivalently() {
    let json = Generic
      .extract(
        &Default::default(),
        &trigger(false),
        &post_request(
          &[("content-type", "application/json")],
          r#"{"git":{"commit":"abc123","ref":"refs/heads/main"}}"#,
        ),
      )
      .unwrap();
    let yaml = Generic
      .extract(
        &Default::default(),
        &trigger(false),
        &post_request(
          &[("content-type", "application/yaml")],
          "git:\n  commit: abc123\n  ref: refs/heads/main\n",
        ),
      )
      .unwrap();
    assert_eq!(json, yaml);
  }

  #[test]
  fn unparseable_json_is_a_client_error() {
    let err = Generic
      .extract(
        &Default::default(),
        &trigger(false),
        &post_request(
          &[("content-type", "application/json")],
          "{ not json",
        ),
      )
      .unwrap_err();
    let HookError::Status(e) = err else {
      panic!("expected status error, got {err:?}");
    };
    assert_eq!(e.status, StatusCode::BAD_REQUEST);
  }

  #[test]
  fn unsupported_content_type_proceeds_with_warning() {
    let extraction = Generic
      .extract(
        &Default::default(),
        &trigger(false),
        &post_request(
          &[("content-type", "text/plain")],
          "whatever",
        ),
      )
      .unwrap();
    let Extraction::Build {
      revision: None,
      warning: Some(warning),
      ..
    } = extraction
    else {
      panic!("expected warning, got {extraction:?}");
    };
    assert!(warning.contains("unsupported Content-Type"));
  }

  #[test]
  fn env_dropped_with_warning_unless_allowed() {
    let body = r#"{"env":[{"variable":"FOO","value":"bar"}]}"#;

    let gated = Generic
      .extract(
        &Default::default(),
        &trigger(false),
        &post_request(&[("content-type", "application/json")], body),
      )
      .unwrap();
    assert_eq!(
      gated,
      Extraction::Build {
        revision: None,
        env: Vec::new(),
        docker_strategy_options: None,
        warning: Some(String::from("env vars ignored")),
      }
    );

    let allowed = Generic
      .extract(
        &Default::default(),
        &trigger(true),
        &post_request(&[("content-type", "application/json")], body),
      )
      .unwrap();
    let Extraction::Build { env, warning: None, .. } = allowed
    else {
      panic!("expected env to pass through, got {allowed:?}");
    };
    assert_eq!(
      env,
      vec![EnvironmentVar {
        variable: String::from("FOO"),
        value: String::from("bar"),
      }]
    );
  }

  #[test]
  fn docker_strategy_options_pass_through() {
    let body = r#"{
      "docker_strategy_options": {
        "build_args": [{"variable":"A","value":"1"}],
        "no_cache": true
      }
    }"#;
    let extraction = Generic
      .extract(
        &Default::default(),
        &trigger(false),
        &post_request(&[("content-type", "application/json")], body),
      )
      .unwrap();
    let Extraction::Build {
      docker_strategy_options: Some(options),
      ..
    } = extraction
    else {
      panic!("expected strategy options, got {extraction:?}");
    };
    assert_eq!(options.no_cache, Some(true));
    assert_eq!(options.build_args.len(), 1);
  }
}
