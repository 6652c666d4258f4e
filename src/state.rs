use crate::{
  api::{Api, Backend},
  config::Config,
  prelude::*,
  sv::{
    Affiliate, Audit, Dashboard, Referral, affiliate::TreeCache,
    analytics::AnalyticsFeed, referral::ReferralCache,
  },
};

pub struct AppState {
  pub db: DatabaseConnection,
  pub config: Config,
  pub backend: Arc<dyn Backend>,
  pub referral_cache: ReferralCache,
  pub tree_cache: TreeCache,
  pub analytics: AnalyticsFeed,
}

pub struct Services<'a> {
  pub referral: Referral<'a>,
  pub affiliate: Affiliate<'a>,
  pub dashboard: Dashboard<'a>,
  pub audit: Audit<'a>,
}

impl AppState {
  pub async fn new(config: Config) -> anyhow::Result<Self> {
    let db = Database::connect(&config.database_url).await?;
    Migrator::up(&db, None).await?;

    let api = Api::new(&config.backend_url, config.backend_token.clone());
    Ok(Self::with_backend(config, db, Arc::new(api)))
  }

  pub fn with_backend(
    config: Config,
    db: DatabaseConnection,
    backend: Arc<dyn Backend>,
  ) -> Self {
    Self {
      referral_cache: ReferralCache::new(config.cache_ttl),
      tree_cache: TreeCache::new(config.cache_ttl),
      analytics: AnalyticsFeed::new(),
      db,
      config,
      backend,
    }
  }

  pub fn sv(&self) -> Services<'_> {
    let backend = self.backend.as_ref();
    Services {
      referral: Referral::new(backend, &self.referral_cache, &self.db),
      affiliate: Affiliate::new(backend, &self.tree_cache),
      dashboard: Dashboard::new(backend, &self.db),
      audit: Audit::new(&self.db),
    }
  }

  pub fn is_admin(&self, user_id: i64) -> bool {
    self.config.admins.contains(&user_id)
  }
}
