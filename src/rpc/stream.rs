//! Event-stream draining.

use reqwest::Response;

use crate::rpc::types::{ClientResult, StreamSummary};

/// Read a streaming response until the server closes it.
///
/// Chunk contents are discarded; only their count and size are reported.
pub async fn drain_event_stream(mut response: Response) -> ClientResult<StreamSummary> {
    let mut summary = StreamSummary::default();
    while let Some(chunk) = response.chunk().await? {
        summary.chunks += 1;
        summary.bytes += chunk.len();
        tracing::trace!(chunk = summary.chunks, len = chunk.len(), "Stream chunk");
    }
    Ok(summary)
}
