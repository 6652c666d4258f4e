//! Shared test utilities: database setup and an in-memory backend

#[cfg(test)]
pub mod test_db {
  use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, DbBackend, Schema,
  };

  use crate::entity::*;

  /// Creates an in-memory SQLite database with all required tables
  pub async fn setup() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let schema = Schema::new(DbBackend::Sqlite);

    let stmt = schema.create_table_from_entity(audit_log::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    db
  }

  /// A database without any tables, so every audit insert fails.
  pub async fn without_tables() -> DatabaseConnection {
    Database::connect("sqlite::memory:").await.unwrap()
  }
}

#[cfg(test)]
pub mod mock {
  use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  };

  use async_trait::async_trait;

  use crate::{api::*, prelude::*};

  /// Backend double keeping rows in memory and counting calls.
  #[derive(Default)]
  pub struct MockBackend {
    pub rewards: Mutex<Vec<ReferralLevelReward>>,
    pub settings: Mutex<Option<ReferralSettings>>,
    pub trees: Mutex<HashMap<i64, AffiliateTreeDetail>>,
    pub withdrawals: Mutex<Vec<RewardWithdrawal>>,
    pub stats: Mutex<OverviewStats>,
    pub fail_writes: AtomicBool,
    pub fail_reads: AtomicBool,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
  }

  impl MockBackend {
    /// Active levels 1..=3 paying 50/30/10 and `max_level = 2`.
    pub fn with_cascade() -> Self {
      let backend = Self::default();
      let reward = |id, level, percentage, is_active| ReferralLevelReward {
        id,
        level,
        percentage,
        is_active,
      };
      *backend.rewards.lock().unwrap() = vec![
        reward(11, 1, 50.0, true),
        reward(12, 2, 30.0, true),
        reward(13, 3, 10.0, true),
        reward(14, 4, 5.0, false),
      ];
      *backend.settings.lock().unwrap() =
        Some(ReferralSettings { max_level: 2 });
      backend
    }

    pub fn node(wallet_id: i64, parent: Option<i64>) -> AffiliateNode {
      AffiliateNode {
        node_id: wallet_id + 1000,
        wallet_id,
        parent_wallet_id: parent,
        commission_percent: 5.0,
        effective_from: Utc::now(),
        is_active: true,
      }
    }

    pub fn add_tree(&self, root_id: i64, nodes: Vec<AffiliateNode>) {
      self.trees.lock().unwrap().insert(
        root_id,
        AffiliateTreeDetail {
          root_id,
          name: Some(format!("tree {root_id}")),
          nodes,
        },
      );
    }

    pub fn fail_writes(&self, fail: bool) {
      self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
      self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
      self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
      self.writes.load(Ordering::SeqCst)
    }

    fn read(&self) -> Result<()> {
      self.reads.fetch_add(1, Ordering::SeqCst);
      if self.fail_reads.load(Ordering::SeqCst) {
        return Err(Error::Api("503: backend down".into()));
      }
      Ok(())
    }

    fn write(&self) -> Result<()> {
      self.writes.fetch_add(1, Ordering::SeqCst);
      if self.fail_writes.load(Ordering::SeqCst) {
        return Err(Error::Api("500: write rejected".into()));
      }
      Ok(())
    }
  }

  #[async_trait]
  impl Backend for MockBackend {
    async fn fetch_level_rewards(&self) -> Result<Vec<ReferralLevelReward>> {
      self.read()?;
      Ok(self.rewards.lock().unwrap().clone())
    }

    async fn update_level_reward(
      &self,
      id: i64,
      percentage: f64,
    ) -> Result<ReferralLevelReward> {
      self.write()?;
      let mut rewards = self.rewards.lock().unwrap();
      let row = rewards
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or_else(|| Error::Api("404: reward not found".into()))?;
      row.percentage = percentage;
      Ok(row.clone())
    }

    async fn fetch_referral_settings(&self) -> Result<ReferralSettings> {
      self.read()?;
      self
        .settings
        .lock()
        .unwrap()
        .ok_or_else(|| Error::Api("404: settings not found".into()))
    }

    async fn update_referral_settings(
      &self,
      max_level: u32,
    ) -> Result<ReferralSettings> {
      self.write()?;
      let settings = ReferralSettings { max_level };
      *self.settings.lock().unwrap() = Some(settings);
      Ok(settings)
    }

    async fn fetch_affiliate_tree_detail(
      &self,
      root_id: i64,
    ) -> Result<AffiliateTreeDetail> {
      self.read()?;
      self
        .trees
        .lock()
        .unwrap()
        .get(&root_id)
        .cloned()
        .ok_or_else(|| Error::Api("404: tree not found".into()))
    }

    async fn list_affiliate_trees(&self) -> Result<Vec<AffiliateTreeSummary>> {
      self.read()?;
      let mut trees: Vec<_> = self
        .trees
        .lock()
        .unwrap()
        .values()
        .map(|t| AffiliateTreeSummary {
          id: t.root_id,
          name: t.name.clone(),
          root_wallet_id: t
            .nodes
            .iter()
            .find(|n| n.parent_wallet_id.is_none())
            .map_or(0, |n| n.wallet_id),
          member_count: t.nodes.len() as u64,
        })
        .collect();
      trees.sort_by_key(|t| t.id);
      Ok(trees)
    }

    async fn fetch_overview_stats(&self) -> Result<OverviewStats> {
      self.read()?;
      Ok(self.stats.lock().unwrap().clone())
    }

    async fn list_withdrawals(
      &self,
      status: Option<WithdrawalStatus>,
    ) -> Result<Vec<RewardWithdrawal>> {
      self.read()?;
      Ok(
        self
          .withdrawals
          .lock()
          .unwrap()
          .iter()
          .filter(|w| status.is_none_or(|s| w.status == s))
          .cloned()
          .collect(),
      )
    }

    async fn update_withdrawal_status(
      &self,
      id: i64,
      status: WithdrawalStatus,
    ) -> Result<RewardWithdrawal> {
      self.write()?;
      let mut withdrawals = self.withdrawals.lock().unwrap();
      let row = withdrawals
        .iter_mut()
        .find(|w| w.id == id)
        .ok_or_else(|| Error::Api("404: withdrawal not found".into()))?;
      row.status = status;
      Ok(row.clone())
    }
  }
}

#[cfg(test)]
pub mod app {
  use super::{mock::MockBackend, test_db};
  use crate::{config::Config, prelude::*, state::AppState};

  pub fn config() -> Config {
    Config::from_lookup(|key| match key {
      "BACKEND_URL" => Some("http://backend.test/api".into()),
      "ADMIN_IDS" => Some("42".into()),
      _ => None,
    })
    .unwrap()
  }

  /// Application state over an in-memory database and the given backend.
  pub async fn state(backend: Arc<MockBackend>) -> AppState {
    AppState::with_backend(config(), test_db::setup().await, backend)
  }
}
