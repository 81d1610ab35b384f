//! Update poll loop.
//!
//! Pulls updates, spawns one task per event and periodically drops expired
//! add-flow sessions. Stops on the shutdown signal and gives in-flight
//! handlers a grace period to finish.

use std::{sync::Arc, time::Duration};

use shoplist_core::{Dispatcher, Result};
use tokio::{sync::broadcast, task::JoinSet};
use tracing::{debug, error, info, warn};

use crate::telegram::{to_event, TelegramClient, Update};

const RETRY_DELAY: Duration = Duration::from_secs(5);
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Source of platform updates
#[async_trait::async_trait]
pub trait UpdateSource: Send + Sync {
    /// Updates with id >= `offset`; may block until some arrive
    async fn next_batch(&self, offset: i64) -> Result<Vec<Update>>;
}

#[async_trait::async_trait]
impl UpdateSource for TelegramClient {
    async fn next_batch(&self, offset: i64) -> Result<Vec<Update>> {
        self.get_updates(offset).await
    }
}

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub bot_username: Option<String>,
    pub grace_period: Duration,
}

/// Run until `shutdown` fires
pub async fn run(
    source: Arc<dyn UpdateSource>,
    dispatcher: Arc<Dispatcher>,
    options: PollOptions,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut offset = 0_i64;
    let mut handlers = JoinSet::new();
    let mut purge = tokio::time::interval(PURGE_INTERVAL);
    info!("polling for updates");

    loop {
        while let Some(done) = handlers.try_join_next() {
            if let Err(e) = done {
                error!("event handler panicked or was cancelled: {e}");
            }
        }

        tokio::select! {
            _ = shutdown.recv() => {
                info!("stopping update polling");
                break;
            }
            _ = purge.tick() => {
                let purged = dispatcher.sessions().purge_expired().await;
                if purged > 0 {
                    debug!(purged, "expired add-flow sessions dropped");
                }
            }
            batch = source.next_batch(offset) => match batch {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        let Some(event) = to_event(update, options.bot_username.as_deref()) else {
                            continue;
                        };
                        let dispatcher = dispatcher.clone();
                        handlers.spawn(async move {
                            if let Err(e) = dispatcher.handle(event).await {
                                error!("failed to handle event: {e}");
                            }
                        });
                    }
                }
                Err(e) => {
                    warn!("failed to fetch updates, retrying in {RETRY_DELAY:?}: {e}");
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        () = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }
    }

    let in_flight = handlers.len();
    if in_flight > 0 {
        info!(in_flight, "waiting for in-flight handlers");
    }
    let drained = tokio::time::timeout(options.grace_period, async {
        while handlers.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!("grace period elapsed, aborting remaining handlers");
        handlers.abort_all();
    }
}
