//! REST client for the platform backend.
//!
//! Every balance, commission and payout computation happens behind this API.
//! The dashboard only reads rows and submits validated updates through the
//! [`Backend`] trait, which services depend on instead of the concrete client.

pub mod model;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use reqwest::{Client, RequestBuilder};
use reqwest_websocket::{Message, RequestBuilderExt};
use serde::de::DeserializeOwned;

pub use self::model::*;
use crate::{prelude::*, sv::analytics::Snapshot};

#[async_trait]
pub trait Backend: Send + Sync {
  /// All reward rows, active and inactive.
  async fn fetch_level_rewards(&self) -> Result<Vec<ReferralLevelReward>>;

  async fn update_level_reward(
    &self,
    id: i64,
    percentage: f64,
  ) -> Result<ReferralLevelReward>;

  async fn fetch_referral_settings(&self) -> Result<ReferralSettings>;

  async fn update_referral_settings(
    &self,
    max_level: u32,
  ) -> Result<ReferralSettings>;

  async fn fetch_affiliate_tree_detail(
    &self,
    root_id: i64,
  ) -> Result<AffiliateTreeDetail>;

  async fn list_affiliate_trees(&self) -> Result<Vec<AffiliateTreeSummary>>;

  async fn fetch_overview_stats(&self) -> Result<OverviewStats>;

  async fn list_withdrawals(
    &self,
    status: Option<WithdrawalStatus>,
  ) -> Result<Vec<RewardWithdrawal>>;

  async fn update_withdrawal_status(
    &self,
    id: i64,
    status: WithdrawalStatus,
  ) -> Result<RewardWithdrawal>;
}

#[derive(Clone)]
pub struct Api {
  client: Client,
  base_url: String,
  token: Option<String>,
}

impl Api {
  pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
    let base_url = base_url.into().trim_end_matches('/').to_string();
    Self { client: Client::new(), base_url, token }
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
    match &self.token {
      Some(token) => request.bearer_auth(token),
      None => request,
    }
  }

  async fn send<T: DeserializeOwned>(
    &self,
    request: RequestBuilder,
  ) -> Result<T> {
    let response = self
      .authorized(request)
      .send()
      .await
      .map_err(|e| Error::Api(format!("Request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
      let reason = response
        .json::<ApiError>()
        .await
        .ok()
        .and_then(|e| e.message.or(e.error))
        .unwrap_or_else(|| status.to_string());
      return Err(Error::Api(format!("{}: {}", status.as_u16(), reason)));
    }

    response
      .json()
      .await
      .map_err(|e| Error::Api(format!("Failed to parse response: {}", e)))
  }

  async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
    trace!("GET {}", path);
    self.send(self.client.get(self.url(path))).await
  }

  /// Open the analytics websocket and yield decoded snapshots until the
  /// server closes the channel.
  pub async fn subscribe_analytics(
    &self,
    url: &str,
  ) -> Result<BoxStream<'static, Result<Snapshot>>> {
    let ws = self
      .authorized(self.client.get(url))
      .upgrade()
      .send()
      .await
      .map_err(|e| Error::Api(format!("Websocket upgrade failed: {}", e)))?
      .into_websocket()
      .await
      .map_err(|e| Error::Api(format!("Websocket handshake failed: {}", e)))?;

    let stream = ws
      .map_err(|e| Error::Api(format!("Websocket error: {}", e)))
      .and_then(|message| async move {
        match message {
          Message::Text(text) => Snapshot::from_json(text.as_bytes()).map(Some),
          Message::Binary(data) => Snapshot::from_json(&data).map(Some),
          Message::Close { code, reason } => Err(Error::Api(format!(
            "analytics channel closed: code = {code}, reason = {reason}"
          ))),
          _ => Ok(None),
        }
      })
      .filter_map(|message| async { message.transpose() })
      .boxed();

    Ok(stream)
  }
}

#[async_trait]
impl Backend for Api {
  async fn fetch_level_rewards(&self) -> Result<Vec<ReferralLevelReward>> {
    self.get("/referral/level-rewards").await
  }

  async fn update_level_reward(
    &self,
    id: i64,
    percentage: f64,
  ) -> Result<ReferralLevelReward> {
    let url = self.url(&format!("/referral/level-rewards/{id}"));
    self
      .send(self.client.patch(url).json(&PercentageUpdate { percentage }))
      .await
  }

  async fn fetch_referral_settings(&self) -> Result<ReferralSettings> {
    self.get("/referral/settings").await
  }

  async fn update_referral_settings(
    &self,
    max_level: u32,
  ) -> Result<ReferralSettings> {
    let url = self.url("/referral/settings");
    self.send(self.client.put(url).json(&ReferralSettings { max_level })).await
  }

  async fn fetch_affiliate_tree_detail(
    &self,
    root_id: i64,
  ) -> Result<AffiliateTreeDetail> {
    self.get(&format!("/affiliate/trees/{root_id}")).await
  }

  async fn list_affiliate_trees(&self) -> Result<Vec<AffiliateTreeSummary>> {
    self.get("/affiliate/trees").await
  }

  async fn fetch_overview_stats(&self) -> Result<OverviewStats> {
    self.get("/dashboard/stats").await
  }

  async fn list_withdrawals(
    &self,
    status: Option<WithdrawalStatus>,
  ) -> Result<Vec<RewardWithdrawal>> {
    let mut request = self.client.get(self.url("/withdrawals"));
    if let Some(status) = status {
      request = request.query(&[("status", status.as_str())]);
    }
    self.send(request).await
  }

  async fn update_withdrawal_status(
    &self,
    id: i64,
    status: WithdrawalStatus,
  ) -> Result<RewardWithdrawal> {
    let url = self.url(&format!("/withdrawals/{id}"));
    self.send(self.client.patch(url).json(&StatusUpdate { status })).await
  }
}
