use anyhow::Result;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use waymark_provider::{ProviderError, StreamEvent};

/// Fold a provider event stream into the final text, invoking `on_chunk`
/// with (delta, full text so far) for every non-empty delta, synchronously
/// and in arrival order.
///
/// Once `cancel` fires, no further callbacks are delivered even if the
/// transport still has buffered bytes, and the call resolves to
/// `ProviderError::Cancelled`. Dropping the stream aborts the underlying
/// request.
pub async fn aggregate_stream(
    mut stream: BoxStream<'static, Result<StreamEvent>>,
    cancel: &CancellationToken,
    on_chunk: &mut (dyn FnMut(&str, &str) + Send),
) -> Result<String> {
    let mut full = String::new();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                return Err(ProviderError::Cancelled.into());
            }

            event = stream.next() => match event {
                Some(Ok(StreamEvent::TextDelta(delta))) => {
                    if delta.is_empty() {
                        continue;
                    }
                    full.push_str(&delta);
                    on_chunk(&delta, &full);
                }
                Some(Ok(StreamEvent::Done)) => break,
                Some(Err(e)) => return Err(e),
                None => break,
            },
        }
    }

    Ok(full)
}
