mod handlers;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use axum::{
  Router,
  routing::{get, patch},
};
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

use crate::{prelude::*, state::AppState};

pub struct Plugin;

/// Admin API routes without the transport layers.
pub fn router(app: Arc<AppState>) -> Router {
  Router::new()
    .route("/health", get(handlers::health))
    .route("/api/referral/levels", get(handlers::levels))
    .route("/api/referral/levels/{level}", patch(handlers::set_level))
    .route(
      "/api/referral/settings",
      get(handlers::settings).put(handlers::set_settings),
    )
    .route("/api/affiliate/trees", get(handlers::trees))
    .route("/api/affiliate/trees/{root_id}", get(handlers::tree))
    .route(
      "/api/affiliate/trees/{root_id}/levels/{level}",
      get(handlers::tree_level),
    )
    .route("/api/overview", get(handlers::overview))
    .route("/api/withdrawals", get(handlers::withdrawals))
    .route("/api/withdrawals/{id}", patch(handlers::set_withdrawal))
    .route("/api/analytics", get(handlers::analytics))
    .route("/api/audit", get(handlers::audit))
    .with_state(app)
}

#[async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let governor_conf = Arc::new(
      GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(100)
        .finish()
        .context("Failed to build rate limiter config")?,
    );

    let governor_limiter = governor_conf.limiter().clone();

    tokio::spawn(async move {
      loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
        governor_limiter.retain_recent();
      }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], app.config.port));
    let service = router(app)
      .layer(
        ServiceBuilder::new()
          .layer(TraceLayer::new_for_http())
          .layer(GovernorLayer::new(governor_conf))
          .layer(
            CorsLayer::new()
              .allow_origin(Any)
              .allow_methods(Any)
              .allow_headers(Any),
          ),
      )
      .into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(addr)
      .await
      .with_context(|| format!("Failed to bind {addr}"))?;

    info!("HTTP Server listening on {addr}");
    axum::serve(listener, service).await.context("Server error")
  }
}
