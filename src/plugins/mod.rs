pub mod analytics;
pub mod cron;
pub mod server;
pub mod telegram;

use std::sync::Arc;

use crate::state::AppState;

#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
  fn name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()>;
}

pub struct App {
  plugins: Vec<Box<dyn Plugin>>,
}

impl App {
  pub fn new() -> Self {
    Self { plugins: Vec::new() }
  }

  pub fn register<P: Plugin + 'static>(mut self, plugin: P) -> Self {
    self.plugins.push(Box::new(plugin));
    self
  }

  /// Starts every plugin on its own task and waits until all of them exit.
  pub async fn run(self, app: Arc<AppState>) {
    let handles = self.plugins.into_iter().map(|plugin| {
      let app = app.clone();
      let name = plugin.name();

      tracing::info!("init `{}`", name);

      tokio::spawn(async move {
        match plugin.start(app).await {
          Ok(()) => tracing::info!("stopped `{}`", name),
          Err(err) => tracing::error!("failed `{}`: {err:#}", name),
        }
      })
    });

    for result in futures::future::join_all(handles).await {
      if let Err(err) = result {
        tracing::error!("plugin task panicked: {err}");
      }
    }
  }
}
