use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use futures::stream::{self, BoxStream, StreamExt};

/// Await `fut`, failing with a timeout error once `limit` elapses.
pub async fn bounded<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => anyhow::bail!("{} timed out after {:?}", what, limit),
    }
}

/// Bound the wait for every item of `items`. A stalled item ends the stream
/// with a timeout error.
pub fn bounded_stream<T: Send + 'static>(
    limit: Duration,
    what: &'static str,
    items: BoxStream<'static, Result<T>>,
) -> BoxStream<'static, Result<T>> {
    stream::unfold(Some(items), move |items| async move {
        let mut items = items?;
        match tokio::time::timeout(limit, items.next()).await {
            Ok(Some(item)) => Some((item, Some(items))),
            Ok(None) => None,
            Err(_) => Some((
                Err(anyhow::anyhow!("{} timed out after {:?}", what, limit)),
                None,
            )),
        }
    })
    .boxed()
}
