#[macro_use]
extern crate tracing;

use std::{net::SocketAddr, str::FromStr};

use anyhow::Context;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tower_http::cors::{Any, CorsLayer};

use crate::config::core_config;

mod config;
mod instantiate;
mod listener;
mod store;

async fn app() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();
  let config = core_config();
  logger::init(&config.logging)?;
  if let Err(e) =
    rustls::crypto::aws_lc_rs::default_provider().install_default()
  {
    error!("Failed to install default crypto provider | {e:?}");
    std::process::exit(1);
  };

  info!("Smelter Core version: v{}", env!("CARGO_PKG_VERSION"));

  if config.pretty_startup_config {
    info!("{:#?}", config.sanitized());
  } else {
    info!("{:?}", config.sanitized());
  }

  info!(
    "{} build configs loaded across {} webhook triggers",
    config.build_configs.len(),
    config
      .build_configs
      .iter()
      .map(|c| c.triggers.len())
      .sum::<usize>()
  );

  let app = Router::new()
    .nest("/listener", listener::router())
    .layer(
      CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any),
    )
    .into_make_service();

  let addr = format!("{}:{}", config.bind_ip, config.port);
  let socket_addr = SocketAddr::from_str(&addr)
    .context("failed to parse listen address")?;

  if config.ssl_enabled {
    info!("🔒 Core SSL Enabled");
    info!("Smelter Core starting on https://{socket_addr}");
    let ssl_config = RustlsConfig::from_pem_file(
      &config.ssl_cert_file,
      &config.ssl_key_file,
    )
    .await
    .context("Invalid ssl cert / key")?;
    axum_server::bind_rustls(socket_addr, ssl_config)
      .serve(app)
      .await
      .context("failed to start https server")
  } else {
    info!("🔓 Core SSL Disabled");
    info!("Smelter Core starting on http://{socket_addr}");
    axum_server::bind(socket_addr)
      .serve(app)
      .await
      .context("failed to start http server")
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let mut term_signal = tokio::signal::unix::signal(
    tokio::signal::unix::SignalKind::terminate(),
  )?;
  tokio::select! {
    res = tokio::spawn(app()) => res?,
    _ = term_signal.recv() => Ok(()),
  }
}
