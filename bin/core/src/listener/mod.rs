use std::sync::OnceLock;

use anyhow::anyhow;
use axum::{
  Router,
  body::Bytes,
  extract::Path,
  http::{HeaderMap, Method, StatusCode},
  routing::post,
};
use axum_extra::{TypedHeader, headers::ContentType};
use serror::AddStatusCodeError;
use smelter_client::entities::build::{
  BuildRequest, BuildTriggerCause, HookType, WebhookResponse,
};

use crate::{
  config::core_config,
  instantiate::{
    BuildInstantiator, Instantiator, default_instantiator,
  },
  store::{
    BuildConfigStore, ConfigBuildConfigs, ConfigSecrets, SecretStore,
  },
};

mod hooks;
mod verify;

use hooks::{Extraction, HookError, HookRegistry, HookRequest};

pub fn router() -> Router {
  Router::new()
    .route("/{config}", post(config_handler))
    .route("/{config}/{*path}", post(subpath_handler))
}

type CoreListener =
  WebhookListener<ConfigBuildConfigs, ConfigSecrets, Instantiator>;

fn core_listener() -> &'static CoreListener {
  static LISTENER: OnceLock<CoreListener> = OnceLock::new();
  LISTENER.get_or_init(|| {
    WebhookListener::new(
      hooks::default_hooks(),
      ConfigBuildConfigs,
      ConfigSecrets,
      default_instantiator(),
    )
  })
}

async fn config_handler(
  Path(config): Path<String>,
  method: Method,
  headers: HeaderMap,
  body: Bytes,
) -> serror::Result<(TypedHeader<ContentType>, String)> {
  respond(config, String::new(), method, headers, body).await
}

async fn subpath_handler(
  Path((config, path)): Path<(String, String)>,
  method: Method,
  headers: HeaderMap,
  body: Bytes,
) -> serror::Result<(TypedHeader<ContentType>, String)> {
  respond(config, path, method, headers, body).await
}

async fn respond(
  config: String,
  path: String,
  method: Method,
  headers: HeaderMap,
  body: Bytes,
) -> serror::Result<(TypedHeader<ContentType>, String)> {
  let req = HookRequest {
    method,
    headers,
    body,
  };
  let res = core_listener()
    .dispatch(&core_config().namespace, &config, &path, req)
    .await?;
  // The build exists by this point. An encoding failure must not
  // fail the call, that would falsely signal no build was created.
  let body = match serde_json::to_string(&res) {
    Ok(body) => body,
    Err(e) => {
      error!("failed to serialize webhook response | {e:?}");
      String::new()
    }
  };
  Ok((TypedHeader(ContentType::json()), body))
}

/// Orchestrates one webhook call: path parse, plugin resolve,
/// build config fetch, trigger match, secret check, payload
/// extraction, then build instantiation with full trigger
/// provenance. The registry and store handles are passed in at
/// construction, nothing else is shared across calls.
pub struct WebhookListener<C, S, I> {
  hooks: &'static HookRegistry,
  configs: C,
  secrets: S,
  instantiator: I,
}

impl<C, S, I> WebhookListener<C, S, I>
where
  C: BuildConfigStore,
  S: SecretStore,
  I: BuildInstantiator,
{
  pub fn new(
    hooks: &'static HookRegistry,
    configs: C,
    secrets: S,
    instantiator: I,
  ) -> WebhookListener<C, S, I> {
    WebhookListener {
      hooks,
      configs,
      secrets,
      instantiator,
    }
  }

  #[instrument(name = "WebhookDispatch", skip(self, req))]
  pub async fn dispatch(
    &self,
    namespace: &str,
    config_name: &str,
    subpath: &str,
    req: HookRequest,
  ) -> serror::Result<WebhookResponse> {
    let parts = subpath
      .trim_start_matches('/')
      .split('/')
      .collect::<Vec<_>>();
    let &[secret, hook_type] = parts.as_slice() else {
      return Err(malformed_subpath(subpath));
    };
    if secret.is_empty() || hook_type.is_empty() {
      return Err(malformed_subpath(subpath));
    }

    let hook_type = hook_type
      .parse::<HookType>()
      .map_err(|_| unknown_hook_type(hook_type))?;
    let plugin = self
      .hooks
      .get(&hook_type)
      .ok_or_else(|| unknown_hook_type(hook_type.as_ref()))?;

    // Callers must not be able to learn anything about build
    // configs unless the config exists and the secret matches.
    // Every failure from here until the secret passes collapses
    // into the same unauthorized response.
    let config =
      match self.configs.get(namespace, config_name).await {
        Ok(config) => config,
        Err(e) => {
          debug!(
            "failed to fetch build config {namespace}/{config_name} | {e:#}"
          );
          return Err(unauthorized(hook_type, config_name));
        }
      };

    let triggers = match plugin.hook_triggers(&config) {
      Ok(triggers) => triggers,
      Err(e) => {
        debug!(
          "no usable {hook_type} triggers on {namespace}/{config_name} | {e:#}"
        );
        return Err(unauthorized(hook_type, config_name));
      }
    };

    debug!(
      "checking secret for {hook_type} webhook trigger of build config {namespace}/{config_name}"
    );
    let trigger = match verify::check_secret(
      namespace,
      secret,
      &triggers,
      &self.secrets,
    )
    .await
    {
      Ok(trigger) => trigger,
      Err(e) => {
        debug!(
          "secret check failed for {namespace}/{config_name} | {e:#}"
        );
        return Err(unauthorized(hook_type, config_name));
      }
    };

    let (revision, env, docker_strategy_options, warning) =
      match plugin.extract(&config, &trigger, &req) {
        Ok(Extraction::Build {
          revision,
          env,
          docker_strategy_options,
          warning,
        }) => (revision, env, docker_strategy_options, warning),
        Ok(Extraction::Ignore) => {
          debug!(
            "{hook_type} webhook for {namespace}/{config_name} ignored the event"
          );
          return Ok(WebhookResponse {
            build: None,
            warning: None,
          });
        }
        Err(HookError::SecretMismatch | HookError::HookNotEnabled) => {
          return Err(unauthorized(hook_type, config_name));
        }
        Err(HookError::MethodNotSupported(method)) => {
          return Err(
            anyhow!(
              "the method {method} is not supported by the {hook_type} webhook"
            )
            .status_code(StatusCode::METHOD_NOT_ALLOWED),
          );
        }
        Err(HookError::Status(e)) => return Err(e),
        Err(HookError::Other(e)) => {
          return Err(e.context("hook failed").into());
        }
      };

    if let Some(warning) = &warning {
      warn!(
        "{hook_type} webhook for {namespace}/{config_name} | {warning}"
      );
    }

    let request = BuildRequest {
      build_config: config.name.clone(),
      triggered_by: vec![BuildTriggerCause::from_hook(
        hook_type,
        revision.clone(),
      )],
      revision,
      env,
      docker_strategy_options,
    };

    let build = self
      .instantiator
      .instantiate(namespace, request)
      .await
      .map_err(|e| e.context("could not generate a build"))?;

    info!(
      "{hook_type} webhook instantiated build {} for {namespace}/{config_name}",
      build.name
    );

    Ok(WebhookResponse {
      build: Some(build),
      warning,
    })
  }
}

fn malformed_subpath(subpath: &str) -> serror::Error {
  anyhow!("unexpected hook subpath {subpath}")
    .status_code(StatusCode::BAD_REQUEST)
}

fn unknown_hook_type(hook_type: &str) -> serror::Error {
  anyhow!("no webhook plugin matching {hook_type}")
    .status_code(StatusCode::NOT_FOUND)
}

fn unauthorized(hook_type: HookType, name: &str) -> serror::Error {
  anyhow!(
    "the webhook {hook_type} for {name} did not accept your secret"
  )
  .status_code(StatusCode::UNAUTHORIZED)
}
