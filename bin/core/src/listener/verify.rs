use anyhow::anyhow;
use smelter_client::entities::build::{
  BuildConfig, HookType, WebhookTrigger,
};

use crate::store::SecretStore;

/// Every trigger on the config whose type equals `hook_type`,
/// preserving declaration order. First-declared triggers are
/// checked first downstream, which keeps trigger selection
/// deterministic when multiple secrets share a hook type.
pub fn hook_triggers(
  config: &BuildConfig,
  hook_type: HookType,
) -> anyhow::Result<Vec<WebhookTrigger>> {
  let triggers = config
    .triggers
    .iter()
    .filter(|trigger| trigger.hook_type == hook_type)
    .cloned()
    .collect::<Vec<_>>();
  if triggers.is_empty() {
    return Err(no_triggers(config, hook_type));
  }
  Ok(triggers)
}

/// [hook_triggers], minus triggers with neither an inline secret
/// nor a secret ref. Such triggers are a config mistake and can
/// never authorize a caller, dropping them here surfaces the
/// same "no triggers of this type" as an absent trigger would.
pub fn matchable_triggers(
  config: &BuildConfig,
  hook_type: HookType,
) -> anyhow::Result<Vec<WebhookTrigger>> {
  let mut triggers = hook_triggers(config, hook_type)?;
  triggers.retain(|trigger| {
    !trigger.secret.is_empty() || !trigger.secret_ref.is_empty()
  });
  if triggers.is_empty() {
    return Err(no_triggers(config, hook_type));
  }
  Ok(triggers)
}

fn no_triggers(
  config: &BuildConfig,
  hook_type: HookType,
) -> anyhow::Error {
  anyhow!(
    "no triggers of type {hook_type} on build config {}",
    config.name
  )
}

/// Checks the presented secret against the candidate triggers in
/// order, returning the first trigger which matches.
///
/// A secret store fetch failure for one candidate is not fatal to
/// the whole call, later candidates may still match. The returned
/// error never distinguishes fetch failure from plain mismatch.
pub async fn check_secret<S: SecretStore>(
  namespace: &str,
  presented: &str,
  triggers: &[WebhookTrigger],
  secrets: &S,
) -> anyhow::Result<WebhookTrigger> {
  for trigger in triggers {
    if !trigger.secret.is_empty() {
      if trigger.secret == presented {
        return Ok(trigger.clone());
      }
      continue;
    }
    if trigger.secret_ref.is_empty() {
      continue;
    }
    match secrets.get(namespace, &trigger.secret_ref).await {
      Ok(value) => {
        if value == presented {
          return Ok(trigger.clone());
        }
      }
      Err(e) => {
        debug!(
          "failed to fetch secret {} in {namespace} | {e:#}",
          trigger.secret_ref
        );
      }
    }
  }
  Err(anyhow!("secret mismatch"))
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use anyhow::{Context, anyhow};

  use super::*;

  struct MapSecrets(HashMap<String, String>);

  impl SecretStore for MapSecrets {
    async fn get(
      &self,
      _namespace: &str,
      name: &str,
    ) -> anyhow::Result<String> {
      self
        .0
        .get(name)
        .cloned()
        .with_context(|| format!("no secret matching {name}"))
    }
  }

  /// Always fails, for the fetch-failure paths.
  struct DownSecrets;

  impl SecretStore for DownSecrets {
    async fn get(
      &self,
      _namespace: &str,
      _name: &str,
    ) -> anyhow::Result<String> {
      Err(anyhow!("secret store unavailable"))
    }
  }

  fn inline_trigger(
    hook_type: HookType,
    secret: &str,
  ) -> WebhookTrigger {
    WebhookTrigger {
      hook_type,
      secret: secret.to_string(),
      ..Default::default()
    }
  }

  fn config_with(triggers: Vec<WebhookTrigger>) -> BuildConfig {
    BuildConfig {
      name: String::from("cfg1"),
      triggers,
      ..Default::default()
    }
  }

  #[test]
  fn matches_triggers_in_declaration_order() {
    let config = config_with(vec![
      inline_trigger(HookType::Github, "S1"),
      inline_trigger(HookType::Generic, "G"),
      inline_trigger(HookType::Github, "S2"),
    ]);
    let triggers =
      hook_triggers(&config, HookType::Github).unwrap();
    assert_eq!(triggers.len(), 2);
    assert_eq!(triggers[0].secret, "S1");
    assert_eq!(triggers[1].secret, "S2");
  }

  #[test]
  fn no_triggers_of_requested_type_is_an_error() {
    let config =
      config_with(vec![inline_trigger(HookType::Github, "S1")]);
    assert!(hook_triggers(&config, HookType::Gitlab).is_err());
  }

  #[test]
  fn matching_is_deterministic_across_calls() {
    let config = config_with(vec![
      inline_trigger(HookType::Github, "S1"),
      inline_trigger(HookType::Github, "S2"),
    ]);
    let first = hook_triggers(&config, HookType::Github).unwrap();
    for _ in 0..5 {
      let again = hook_triggers(&config, HookType::Github).unwrap();
      assert_eq!(first, again);
    }
  }

  #[test]
  fn secretless_triggers_are_not_matchable() {
    let config = config_with(vec![WebhookTrigger {
      hook_type: HookType::Github,
      ..Default::default()
    }]);
    assert!(hook_triggers(&config, HookType::Github).is_ok());
    assert!(matchable_triggers(&config, HookType::Github).is_err());
  }

  #[tokio::test]
  async fn second_trigger_secret_matches() {
    let triggers = vec![
      inline_trigger(HookType::Github, "S1"),
      inline_trigger(HookType::Github, "S2"),
    ];
    let secrets = MapSecrets(Default::default());
    let matched =
      check_secret("default", "S2", &triggers, &secrets)
        .await
        .unwrap();
    assert_eq!(matched.secret, "S2");

    let err = check_secret("default", "S3", &triggers, &secrets)
      .await
      .unwrap_err();
    assert_eq!(format!("{err:#}"), "secret mismatch");
  }

  #[tokio::test]
  async fn secret_ref_resolves_through_the_store() {
    let triggers = vec![WebhookTrigger {
      hook_type: HookType::Generic,
      secret_ref: String::from("hook-secret"),
      ..Default::default()
    }];
    let secrets = MapSecrets(HashMap::from([(
      String::from("hook-secret"),
      String::from("abc"),
    )]));
    let matched =
      check_secret("default", "abc", &triggers, &secrets)
        .await
        .unwrap();
    assert_eq!(matched.secret_ref, "hook-secret");
  }

  #[tokio::test]
  async fn fetch_failure_falls_through_to_later_candidates() {
    let triggers = vec![
      WebhookTrigger {
        hook_type: HookType::Generic,
        secret_ref: String::from("missing"),
        ..Default::default()
      },
      inline_trigger(HookType::Generic, "abc"),
    ];
    let secrets = MapSecrets(Default::default());
    let matched =
      check_secret("default", "abc", &triggers, &secrets)
        .await
        .unwrap();
    assert_eq!(matched.secret, "abc");
  }

  #[tokio::test]
  async fn fetch_failure_is_indistinguishable_from_mismatch() {
    let by_ref = vec![WebhookTrigger {
      hook_type: HookType::Generic,
      secret_ref: String::from("hook-secret"),
      ..Default::default()
    }];
    let store_down =
      check_secret("default", "abc", &by_ref, &DownSecrets)
        .await
        .unwrap_err();

    let inline = vec![inline_trigger(HookType::Generic, "other")];
    let mismatch = check_secret(
      "default",
      "abc",
      &inline,
      &MapSecrets(Default::default()),
    )
    .await
    .unwrap_err();

    assert_eq!(
      format!("{store_down:#}"),
      format!("{mismatch:#}")
    );
  }
}
