use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
  api::{
    AffiliateTreeSummary, ReferralLevelReward, ReferralSettings,
    RewardWithdrawal, WithdrawalStatus,
  },
  entity::audit_log,
  prelude::*,
  state::AppState,
  sv::{
    affiliate::{LeveledNode, TreeView},
    dashboard::Overview,
    referral::{Outcome, ReferralOverview},
  },
};

type App = State<Arc<AppState>>;

/// HTTP actor recorded in the audit log.
const ACTOR: &str = "http";

const AUDIT_LIMIT: u64 = 50;
const AUDIT_MAX: u64 = 500;

impl Error {
  fn status(&self) -> StatusCode {
    match self {
      _ if self.is_validation() => StatusCode::UNPROCESSABLE_ENTITY,
      Error::LevelNotFound(_) | Error::TreeNotFound(_) => StatusCode::NOT_FOUND,
      Error::Persistence(_) | Error::Api(_) | Error::CycleDetected(_) => {
        StatusCode::BAD_GATEWAY
      }
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!("request failed: {}", self);
    } else {
      debug!("request rejected: {}", self);
    }
    (status, Json(Status { success: false, msg: Some(self.user_message()) }))
      .into_response()
  }
}

#[derive(Serialize)]
pub struct Status {
  success: bool,
  msg: Option<String>,
}

#[derive(Serialize)]
pub struct Changed<T> {
  updated: bool,
  data: T,
}

impl<T> From<Outcome<T>> for Changed<T> {
  fn from(outcome: Outcome<T>) -> Self {
    Self { updated: outcome.is_updated(), data: outcome.into_inner() }
  }
}

#[derive(Deserialize)]
pub struct SetPercentage {
  percentage: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMaxLevel {
  max_level: i64,
}

#[derive(Deserialize)]
pub struct SetStatus {
  status: WithdrawalStatus,
}

#[derive(Deserialize)]
pub struct StatusFilter {
  status: Option<WithdrawalStatus>,
}

#[derive(Deserialize)]
pub struct Limit {
  limit: Option<u64>,
}

pub async fn health() -> Json<json::Value> {
  Json(json::json!({
    "status": "ok",
    "version": env!("CARGO_PKG_VERSION"),
  }))
}

pub async fn levels(State(app): App) -> Result<Json<ReferralOverview>> {
  Ok(Json(app.sv().referral.overview().await?))
}

pub async fn set_level(
  State(app): App,
  Path(level): Path<u32>,
  Json(req): Json<SetPercentage>,
) -> Result<Json<Changed<ReferralLevelReward>>> {
  let outcome =
    app.sv().referral.set_level_percentage(ACTOR, level, req.percentage).await?;
  Ok(Json(outcome.into()))
}

pub async fn settings(State(app): App) -> Result<Json<ReferralSettings>> {
  Ok(Json(app.sv().referral.settings().await?))
}

pub async fn set_settings(
  State(app): App,
  Json(req): Json<SetMaxLevel>,
) -> Result<Json<Changed<ReferralSettings>>> {
  let outcome = app.sv().referral.set_max_level(ACTOR, req.max_level).await?;
  Ok(Json(outcome.into()))
}

pub async fn trees(
  State(app): App,
) -> Result<Json<Vec<AffiliateTreeSummary>>> {
  Ok(Json(app.sv().affiliate.trees().await?))
}

pub async fn tree(
  State(app): App,
  Path(root_id): Path<i64>,
) -> Result<Json<TreeView>> {
  let view = app.sv().affiliate.tree(root_id).await?;
  Ok(Json(TreeView::clone(&view)))
}

pub async fn tree_level(
  State(app): App,
  Path((root_id, level)): Path<(i64, u32)>,
) -> Result<Json<Vec<LeveledNode>>> {
  Ok(Json(app.sv().affiliate.members_at(root_id, level).await?))
}

pub async fn overview(State(app): App) -> Result<Json<Overview>> {
  Ok(Json(app.sv().dashboard.overview().await?))
}

pub async fn withdrawals(
  State(app): App,
  Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<RewardWithdrawal>>> {
  Ok(Json(app.sv().dashboard.withdrawals(filter.status).await?))
}

pub async fn set_withdrawal(
  State(app): App,
  Path(id): Path<i64>,
  Json(req): Json<SetStatus>,
) -> Result<Json<RewardWithdrawal>> {
  let sv = app.sv();
  Ok(Json(sv.dashboard.set_withdrawal_status(ACTOR, id, req.status).await?))
}

pub async fn analytics(State(app): App) -> Response {
  match app.analytics.latest() {
    Some(snapshot) => Json(snapshot.as_ref().clone()).into_response(),
    None => StatusCode::NO_CONTENT.into_response(),
  }
}

pub async fn audit(
  State(app): App,
  Query(query): Query<Limit>,
) -> Result<Json<Vec<audit_log::Model>>> {
  let limit = query.limit.unwrap_or(AUDIT_LIMIT).clamp(1, AUDIT_MAX);
  Ok(Json(app.sv().audit.recent(limit).await?))
}

#[cfg(test)]
mod tests {
  use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, header},
  };
  use tower::ServiceExt;

  use super::*;
  use crate::{
    plugins::server::router,
    sv::{
      analytics::Snapshot,
      test_utils::{app, mock::MockBackend},
    },
  };

  async fn setup() -> (Router, Arc<MockBackend>, Arc<AppState>) {
    let backend = Arc::new(MockBackend::with_cascade());
    backend.add_tree(
      1,
      vec![
        MockBackend::node(1, None),
        MockBackend::node(2, Some(1)),
        MockBackend::node(3, Some(2)),
        MockBackend::node(4, Some(99)),
      ],
    );
    let app = Arc::new(app::state(backend.clone()).await);
    (router(app.clone()), backend, app)
  }

  async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<json::Value>,
  ) -> (StatusCode, json::Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
      Some(body) => request
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string())),
      None => request.body(Body::empty()),
    }
    .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
      json::Value::Null
    } else {
      json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  #[tokio::test]
  async fn test_health() {
    let (router, ..) = setup().await;
    let (status, body) = call(&router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
  }

  #[tokio::test]
  async fn test_levels_overview() {
    let (router, ..) = setup().await;
    let (status, body) =
      call(&router, Method::GET, "/api/referral/levels", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["maxLevel"], 2);
    assert_eq!(body["activeLevels"], 3);
    assert_eq!(body["levels"][1]["percentage"], 30.0);
  }

  #[tokio::test]
  async fn test_set_level() {
    let (router, backend, _) = setup().await;

    let (status, body) = call(
      &router,
      Method::PATCH,
      "/api/referral/levels/2",
      Some(json::json!({ "percentage": 40.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], true);
    assert_eq!(body["data"]["percentage"], 40.0);

    let (status, body) = call(
      &router,
      Method::PATCH,
      "/api/referral/levels/2",
      Some(json::json!({ "percentage": 40.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], false);
    assert_eq!(backend.writes(), 1);
  }

  #[tokio::test]
  async fn test_cascade_violation_is_unprocessable() {
    let (router, backend, _) = setup().await;

    let (status, body) = call(
      &router,
      Method::PATCH,
      "/api/referral/levels/2",
      Some(json::json!({ "percentage": 55.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["msg"], "Level 2 cannot pay more than level 1 (50%)");
    assert_eq!(backend.writes(), 0);
  }

  #[tokio::test]
  async fn test_unknown_level_is_not_found() {
    let (router, ..) = setup().await;
    let (status, _) = call(
      &router,
      Method::PATCH,
      "/api/referral/levels/9",
      Some(json::json!({ "percentage": 1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn test_persistence_failure_is_bad_gateway() {
    let (router, backend, _) = setup().await;
    backend.fail_writes(true);

    let (status, body) = call(
      &router,
      Method::PUT,
      "/api/referral/settings",
      Some(json::json!({ "maxLevel": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["msg"].as_str().unwrap().starts_with("Update failed"));
  }

  #[tokio::test]
  async fn test_set_max_level() {
    let (router, ..) = setup().await;

    let (status, body) = call(
      &router,
      Method::PUT,
      "/api/referral/settings",
      Some(json::json!({ "maxLevel": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["msg"], "max level must be between 1 and 3");

    let (status, body) = call(
      &router,
      Method::PUT,
      "/api/referral/settings",
      Some(json::json!({ "maxLevel": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["maxLevel"], 3);
  }

  #[tokio::test]
  async fn test_tree_levels() {
    let (router, ..) = setup().await;

    let (status, body) =
      call(&router, Method::GET, "/api/affiliate/trees/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["depth"], 3);
    assert_eq!(body["orphans"], json::json!([4]));

    let (status, body) =
      call(&router, Method::GET, "/api/affiliate/trees/1/levels/1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let wallets: Vec<_> =
      body.as_array().unwrap().iter().map(|n| n["walletId"].clone()).collect();
    assert_eq!(wallets, vec![json::json!(1), json::json!(4)]);

    let (status, _) =
      call(&router, Method::GET, "/api/affiliate/trees/5", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn test_withdrawal_actions_are_audited() {
    let (router, backend, _) = setup().await;
    backend.withdrawals.lock().unwrap().push(RewardWithdrawal {
      id: 7,
      wallet_id: 70,
      amount: "12.50".into(),
      asset: "USDT".into(),
      status: WithdrawalStatus::Pending,
      requested_at: Utc::now(),
    });

    let (status, body) =
      call(&router, Method::GET, "/api/withdrawals?status=pending", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = call(
      &router,
      Method::PATCH,
      "/api/withdrawals/7",
      Some(json::json!({ "status": "rejected" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rejected");

    let (status, body) =
      call(&router, Method::GET, "/api/audit?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["action"], "withdrawal_status");
    assert_eq!(body[0]["actor"], "http");
    assert_eq!(body[0]["subject"], "withdrawal 7");
  }

  #[tokio::test]
  async fn test_analytics_snapshot() {
    let (router, _, app) = setup().await;

    let (status, _) = call(&router, Method::GET, "/api/analytics", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let snapshot = Snapshot::from_json(
      br#"{"timestamp":"2026-10-19T10:00:00Z","activeUsers":9}"#,
    )
    .unwrap();
    app.analytics.publish(snapshot);

    let (status, body) =
      call(&router, Method::GET, "/api/analytics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["activeUsers"], 9);
  }

  #[tokio::test]
  async fn test_backend_outage_is_bad_gateway() {
    let (router, backend, _) = setup().await;
    backend.fail_reads(true);

    let (status, body) =
      call(&router, Method::GET, "/api/overview", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["msg"], "Backend is unavailable, try again later");
  }
}
