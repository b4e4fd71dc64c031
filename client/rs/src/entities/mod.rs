use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Subtypes of [Build][build::Build] and [BuildConfig][build::BuildConfig].
pub mod build;
/// [core config][config::CoreConfig] and environment overrides.
pub mod config;
/// Subtypes of [LogConfig][logger::LogConfig].
pub mod logger;

#[typeshare(serialized_as = "number")]
pub type I64 = i64;

/// Unix timestamp in milliseconds.
pub fn smelter_timestamp() -> I64 {
  chrono::Utc::now().timestamp_millis()
}

/// An environment variable override attached to a build.
/// Order is preserved from the incoming payload.
#[typeshare]
#[derive(
  Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct EnvironmentVar {
  pub variable: String,
  pub value: String,
}

pub fn empty_or_redacted(src: &str) -> String {
  if src.is_empty() {
    String::new()
  } else {
    String::from("##############")
  }
}
