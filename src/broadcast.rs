use futures::stream::{Stream, StreamExt};
use tracing::{debug, info};

use crate::platform::{ChatPlatform, TextFormat};

/// Totals for one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastResult {
    pub attempted: usize,
    pub delivered: usize,
}

/// Send `body` to every recipient the stream yields, at most `concurrency`
/// sends in flight. A failed send is counted and skipped, never retried.
pub async fn broadcast<S>(
    platform: &dyn ChatPlatform,
    body: &str,
    recipients: S,
    concurrency: usize,
) -> BroadcastResult
where
    S: Stream<Item = i64>,
{
    let result = recipients
        .map(|chat_id| async move {
            let sent = platform.send_message(chat_id, body, TextFormat::Plain).await;
            (chat_id, sent)
        })
        .buffer_unordered(concurrency.max(1))
        .fold(BroadcastResult::default(), |mut totals, (chat_id, sent)| async move {
            totals.attempted += 1;
            match sent {
                Ok(()) => totals.delivered += 1,
                // Blocked the bot, deactivated account, ...
                Err(e) => debug!("Broadcast to {} failed: {:#}", chat_id, e),
            }
            totals
        })
        .await;

    info!(
        "Broadcast delivered to {} of {} recipients",
        result.delivered, result.attempted
    );
    result
}
