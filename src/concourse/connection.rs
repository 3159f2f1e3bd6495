//! Live build log stream.
//!
//! [`SseConnection::open`] issues the request and hands the response body to
//! a background task. The task decodes SSE frames, keeps the `log` events and
//! sends them on as one batch per network chunk.

use super::client::{check_status, endpoint, HttpClient};
use super::events::{is_end_of_stream, parse_log_event};
use super::sse::{SseDecoder, SseEvent};
use crate::error::ApiError;
use crate::model::{LogEvent, Target};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Url;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub type LogBatch = Result<Vec<LogEvent>, ApiError>;

pub struct SseConnection {
    url: Url,
    rx: mpsc::UnboundedReceiver<LogBatch>,
    last_event_id: watch::Receiver<Option<String>>,
    task: JoinHandle<()>,
}

impl SseConnection {
    pub async fn open(client: &HttpClient, target: &Target, build_id: u64) -> Result<Self, ApiError> {
        let id = build_id.to_string();
        let url = endpoint(&target.api, &["api", "v1", "builds", &id, "events"])?;
        tracing::info!(%url, "opening build event stream");

        let mut request = client
            .inner()
            .get(url.clone())
            .header(ACCEPT, "text/event-stream");
        if !target.token.value.is_empty() {
            request = request.header(AUTHORIZATION, target.token.auth_value());
        }
        let response = request.send().await?;
        let response = check_status(response).await?;

        Ok(Self::from_stream(url, response.bytes_stream()))
    }

    /// Attach to an already-open byte stream.
    pub fn from_stream<S>(url: Url, stream: S) -> Self
    where
        S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (id_tx, id_rx) = watch::channel(None);
        let task = tokio::spawn(pump(Box::pin(stream), tx, id_tx));
        Self {
            url,
            rx,
            last_event_id: id_rx,
            task,
        }
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn last_event_id(&self) -> Option<String> {
        self.last_event_id.borrow().clone()
    }

    /// Next batch of log lines. `None` once the build's event stream is over.
    pub async fn next_batch(&mut self) -> Option<LogBatch> {
        self.rx.recv().await
    }

    pub fn close(&mut self) {
        self.task.abort();
        self.rx.close();
    }
}

impl Drop for SseConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Log events in `events`, plus whether the stream's end marker was among
/// them. Anything after the end marker is ignored.
fn collect_logs(events: &[SseEvent]) -> (Vec<LogEvent>, bool) {
    let mut logs = Vec::new();
    for event in events {
        if is_end_of_stream(event) {
            return (logs, true);
        }
        match parse_log_event(event) {
            Ok(log) => logs.push(log),
            Err(e) => tracing::debug!("dropping event: {e}"),
        }
    }
    (logs, false)
}

async fn pump<S>(
    mut stream: S,
    tx: mpsc::UnboundedSender<LogBatch>,
    id_tx: watch::Sender<Option<String>>,
) where
    S: Stream<Item = reqwest::Result<Bytes>> + Unpin,
{
    let mut decoder = SseDecoder::new();
    while let Some(chunk) = stream.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                if tx.send(Err(e.into())).is_err() {
                    tracing::warn!("log stream: channel closed");
                }
                return;
            }
        };

        let events = decoder.push(&bytes);
        if let Some(id) = decoder.last_event_id() {
            id_tx.send_replace(Some(id.to_string()));
        }

        let (logs, ended) = collect_logs(&events);
        if !logs.is_empty() && tx.send(Ok(logs)).is_err() {
            tracing::warn!("log stream: channel closed");
            return;
        }
        if ended {
            tracing::info!("build event stream ended");
            return;
        }
    }
    decoder.finish();
    tracing::info!("build event stream closed by server");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn log_frame(id: u64, payload: &str) -> String {
        let data = serde_json::json!({
            "event": "log",
            "version": "5.1",
            "data": { "payload": payload, "origin": { "id": "step" } }
        });
        format!("id: {id}\nevent: event\ndata: {data}\n\n")
    }

    fn chunks(parts: Vec<String>) -> impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static {
        futures::stream::iter(parts.into_iter().map(|p| Ok(Bytes::from(p))))
    }

    fn url() -> Url {
        Url::parse("https://ci.example.com/api/v1/builds/7/events").unwrap()
    }

    fn payloads(batch: &[LogEvent]) -> Vec<&str> {
        batch.iter().map(|e| e.payload.as_str()).collect()
    }

    #[test]
    fn collect_logs_stops_at_end_marker() {
        let events = vec![
            SseEvent {
                id: None,
                event: "event".to_string(),
                data: r#"{"event":"log","data":{"payload":"a"}}"#.to_string(),
                retry: None,
            },
            SseEvent {
                id: None,
                event: "end".to_string(),
                data: String::new(),
                retry: None,
            },
            SseEvent {
                id: None,
                event: "event".to_string(),
                data: r#"{"event":"log","data":{"payload":"b"}}"#.to_string(),
                retry: None,
            },
        ];
        let (logs, ended) = collect_logs(&events);
        assert_eq!(payloads(&logs), vec!["a"]);
        assert!(ended);
    }

    #[tokio::test]
    async fn one_batch_per_chunk() {
        let first = format!("{}{}", log_frame(1, "one"), log_frame(2, "two"));
        let second = log_frame(3, "three");
        let mut conn = SseConnection::from_stream(url(), chunks(vec![first, second]));

        let batch = conn.next_batch().await.unwrap().unwrap();
        assert_eq!(payloads(&batch), vec!["one", "two"]);
        let batch = conn.next_batch().await.unwrap().unwrap();
        assert_eq!(payloads(&batch), vec!["three"]);
        assert!(conn.next_batch().await.is_none());
        assert_eq!(conn.last_event_id().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn frame_split_across_chunks() {
        let frame = log_frame(1, "split line");
        let (a, b) = frame.split_at(frame.len() / 2);
        let mut conn =
            SseConnection::from_stream(url(), chunks(vec![a.to_string(), b.to_string()]));

        let batch = conn.next_batch().await.unwrap().unwrap();
        assert_eq!(payloads(&batch), vec!["split line"]);
        assert!(conn.next_batch().await.is_none());
    }

    #[tokio::test]
    async fn unparseable_events_are_dropped() {
        let status = "event: event\ndata: {\"event\":\"status\",\"data\":{\"status\":\"started\"}}\n\n";
        let garbage = "event: event\ndata: not json\n\n";
        let body = format!("{status}{garbage}{}", log_frame(4, "kept"));
        let mut conn = SseConnection::from_stream(url(), chunks(vec![body]));

        let batch = conn.next_batch().await.unwrap().unwrap();
        assert_eq!(payloads(&batch), vec!["kept"]);
    }

    #[tokio::test]
    async fn end_event_closes_stream() {
        let body = format!("{}event: end\ndata\n\n", log_frame(1, "last"));
        let after = log_frame(2, "never delivered");
        let mut conn = SseConnection::from_stream(url(), chunks(vec![body, after]));

        let batch = conn.next_batch().await.unwrap().unwrap();
        assert_eq!(payloads(&batch), vec!["last"]);
        assert!(conn.next_batch().await.is_none());
    }

    #[tokio::test]
    async fn chunk_without_logs_sends_nothing() {
        let keepalive = ": ping\n\n".to_string();
        let mut conn = SseConnection::from_stream(
            url(),
            chunks(vec![keepalive, log_frame(9, "after ping")]),
        );
        let batch = conn.next_batch().await.unwrap().unwrap();
        assert_eq!(payloads(&batch), vec!["after ping"]);
    }

    #[tokio::test]
    async fn close_stops_delivery() {
        let stream = futures::stream::pending::<reqwest::Result<Bytes>>();
        let mut conn = SseConnection::from_stream(url(), stream);
        assert_eq!(conn.url(), "https://ci.example.com/api/v1/builds/7/events");
        conn.close();
        assert!(conn.next_batch().await.is_none());
    }
}
