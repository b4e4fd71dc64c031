use anyhow::{Context, anyhow};
use smelter_client::entities::{
  build::{Build, BuildRequest},
  smelter_timestamp,
};
use uuid::Uuid;

use crate::{
  config::core_config,
  store::{BuildConfigStore, ConfigBuildConfigs},
};

/// Creates a new build run from a [BuildRequest]. The instantiator
/// applies the build config's own defaults beneath the request's
/// overrides. Each request is consumed exactly once, failures are
/// never retried here.
pub trait BuildInstantiator {
  async fn instantiate(
    &self,
    namespace: &str,
    request: BuildRequest,
  ) -> anyhow::Result<Build>;
}

/// The instantiator wired at startup, selected by
/// `builder_url` in the core config.
pub enum Instantiator {
  Local(LocalInstantiator),
  Forward(ForwardInstantiator),
}

pub fn default_instantiator() -> Instantiator {
  let config = core_config();
  if config.builder_url.is_empty() {
    Instantiator::Local(LocalInstantiator)
  } else {
    Instantiator::Forward(ForwardInstantiator::new(
      config.builder_url.clone(),
      config.builder_passkey.clone(),
    ))
  }
}

impl BuildInstantiator for Instantiator {
  async fn instantiate(
    &self,
    namespace: &str,
    request: BuildRequest,
  ) -> anyhow::Result<Build> {
    match self {
      Instantiator::Local(local) => {
        local.instantiate(namespace, request).await
      }
      Instantiator::Forward(forward) => {
        forward.instantiate(namespace, request).await
      }
    }
  }
}

/// Assigns the build identity and logs it. The terminal boundary
/// when no downstream builder is configured.
pub struct LocalInstantiator;

impl BuildInstantiator for LocalInstantiator {
  async fn instantiate(
    &self,
    namespace: &str,
    request: BuildRequest,
  ) -> anyhow::Result<Build> {
    let config =
      ConfigBuildConfigs.get(namespace, &request.build_config).await?;

    let id = Uuid::new_v4().to_string();
    let name = format!("{}-{}", config.name, &id[..8]);

    let mut env = config.env;
    env.extend(request.env);

    let build = Build {
      id,
      name,
      namespace: namespace.to_string(),
      build_config: config.name,
      source: config.source,
      revision: request.revision,
      env,
      docker_strategy_options: request.docker_strategy_options,
      triggered_by: request.triggered_by,
      created_at: smelter_timestamp(),
    };

    info!(
      "instantiated build {} for config {namespace}/{}",
      build.name, build.build_config
    );

    Ok(build)
  }
}

/// Hands the request off to a downstream builder over http,
/// the builder owns identity assignment and execution.
pub struct ForwardInstantiator {
  address: String,
  passkey: String,
  reqwest: reqwest::Client,
}

impl ForwardInstantiator {
  pub fn new(address: String, passkey: String) -> ForwardInstantiator {
    ForwardInstantiator {
      address,
      passkey,
      reqwest: Default::default(),
    }
  }
}

impl BuildInstantiator for ForwardInstantiator {
  async fn instantiate(
    &self,
    namespace: &str,
    request: BuildRequest,
  ) -> anyhow::Result<Build> {
    let res = self
      .reqwest
      .post(format!("{}/build/{namespace}", self.address))
      .header("authorization", &self.passkey)
      .json(&request)
      .send()
      .await
      .context("failed to reach downstream builder")?;

    let status = res.status();
    if !status.is_success() {
      let text = res.text().await.unwrap_or_default();
      return Err(anyhow!(
        "downstream builder rejected build request | {status} | {text}"
      ));
    }

    res
      .json()
      .await
      .context("failed to parse build from builder response")
  }
}
