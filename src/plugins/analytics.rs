use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use crate::{
  api::Api, plugins::Plugin, prelude::*, state::AppState,
  sv::analytics::{AnalyticsFeed, Snapshot},
};

/// Mirrors the backend analytics websocket into [`AnalyticsFeed`].
pub struct Feed;

#[async_trait]
impl Plugin for Feed {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let Some(url) = app.config.analytics_ws_url.clone() else {
      info!("Analytics feed disabled (ANALYTICS_WS_URL not set)");
      return Ok(());
    };

    let api =
      Api::new(&app.config.backend_url, app.config.backend_token.clone());
    let delay = app.config.reconnect_delay;

    loop {
      match api.subscribe_analytics(&url).await {
        Ok(stream) => {
          info!("Subscribed to analytics at {}", url);
          let received = forward(stream, &app.analytics).await;
          warn!("Analytics channel ended after {} snapshot(s)", received);
        }
        Err(e) => error!("Analytics subscription failed: {}", e),
      }

      debug!("reconnecting in {}", humantime::format_duration(delay));
      tokio::time::sleep(delay).await;
    }
  }
}

/// Publishes snapshots until the stream fails or ends. Returns how many
/// were received.
async fn forward(
  stream: impl Stream<Item = Result<Snapshot>>,
  feed: &AnalyticsFeed,
) -> usize {
  let mut stream = std::pin::pin!(stream);
  let mut received = 0;

  while let Some(next) = stream.next().await {
    match next {
      Ok(snapshot) => {
        received += 1;
        trace!("analytics snapshot at {}", snapshot.timestamp);
        feed.publish(snapshot);
      }
      Err(e) => {
        warn!("{}", e);
        break;
      }
    }
  }

  received
}
