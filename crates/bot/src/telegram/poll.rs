//! The long-poll loop.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::commerce::Commerce;
use crate::engine::Engine;
use crate::geo::Locations;
use crate::store::StateStore;

use super::client::TelegramClient;
use super::transport::TelegramTransport;

/// Long-poll wait per `getUpdates` call.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause before retrying after a failed poll.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Poll for updates forever, dispatching each through the engine.
///
/// A failed dispatch is logged and the loop moves on: the state store was
/// not written, so the user's next message retries from the same state.
pub async fn run<C, L, S>(
    client: TelegramClient,
    transport: TelegramTransport,
    engine: Arc<Engine<C, L, S, TelegramTransport>>,
) where
    C: Commerce,
    L: Locations,
    S: StateStore,
{
    info!("Telegram bot started");
    let mut offset = 0_i64;

    loop {
        let updates = match client.get_updates(offset, POLL_TIMEOUT_SECS).await {
            Ok(updates) => updates,
            Err(err) => {
                warn!(error = %err, "getUpdates failed, retrying");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);

            let Some((user_key, event)) = transport.decode(update) else {
                continue;
            };

            if let Err(err) = engine.handle_event(&user_key, event).await {
                if err.is_transient() {
                    warn!(user = %user_key, error = %err, "dispatch failed, state unchanged");
                } else {
                    error!(user = %user_key, error = %err, "dispatch rejected");
                }
            }
        }
    }
}
