use anyhow::{Context, anyhow};
use serde_json::Value;

use crate::entities::build::{HookType, WebhookResponse};

pub mod entities;

/// Thin client for the Smelter core API.
///
/// Currently only covers the webhook listener, which is the only
/// unauthenticated surface — the secret in the url is the auth.
#[derive(Clone)]
pub struct SmelterClient {
  address: String,
  reqwest: reqwest::Client,
}

impl SmelterClient {
  pub fn new(address: impl Into<String>) -> SmelterClient {
    SmelterClient {
      address: address.into(),
      reqwest: Default::default(),
    }
  }

  /// Fire a webhook at the core listener:
  /// `POST {address}/listener/{config}/{secret}/{hook_type}`.
  ///
  /// The payload is forwarded as the request body. Pass
  /// `Value::Null` to send an empty body (valid for the generic
  /// hook).
  pub async fn trigger_webhook(
    &self,
    config: &str,
    secret: &str,
    hook_type: HookType,
    payload: &Value,
  ) -> anyhow::Result<WebhookResponse> {
    let req = self.reqwest.post(format!(
      "{}/listener/{config}/{secret}/{hook_type}",
      self.address
    ));
    let req = if payload.is_null() {
      req
    } else {
      req.json(payload)
    };
    let res =
      req.send().await.context("failed to reach smelter core")?;
    let status = res.status();
    if !status.is_success() {
      let text = res.text().await.unwrap_or_default();
      return Err(anyhow!(
        "webhook dispatch failed | {status} | {text}"
      ));
    }
    res
      .json()
      .await
      .context("failed to parse webhook response body")
  }
}
