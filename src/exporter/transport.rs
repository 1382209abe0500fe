//! Batched delivery of wire spans to the collector.

use crate::exporter::model::span::Span;
use crate::exporter::uploader::Uploader;
use crate::exporter::{env, Error};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use url::Url;

/// Batch size applied when the configured value is zero.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Flush interval applied when the configured value is zero.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_millis(200);
/// Default capacity of the local span queue.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 2_048;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Delivery mechanism for translated spans.
///
/// `send` enqueues one span and must not block on network delivery; `close`
/// flushes whatever is buffered and releases resources. Implementations
/// synchronize their own internal state, callers may invoke `send` from any
/// number of threads.
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Enqueue one span for delivery.
    fn send(&self, span: Span) -> Result<(), Error>;

    /// Flush buffered spans and shut the transport down.
    fn close(&self) -> Result<(), Error>;
}

/// Messages exchanged between callers and the background thread.
#[allow(clippy::large_enum_variant)]
#[derive(Debug)]
enum BatchMessage {
    Span(Span),
    Flush(SyncSender<Result<(), Error>>),
    Close(SyncSender<Result<(), Error>>),
}

/// [`Transport`] that batches spans on a dedicated background thread and
/// posts them to a Zipkin collector as JSON v2.
///
/// A batch is flushed when it reaches the configured size or when the flush
/// timeout elapses, whichever comes first. `send` only blocks on the local
/// queue; a full queue surfaces as [`Error::QueueFull`]. Background upload
/// failures are logged, flush and close failures are returned to the caller.
#[derive(Debug)]
pub struct HttpTransport {
    message_sender: SyncSender<BatchMessage>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    is_closed: AtomicBool,
    dropped_span_count: Arc<AtomicUsize>,
    batch_size: usize,
    flush_timeout: Duration,
}

impl HttpTransport {
    /// Start building a transport bound to the given collector endpoint.
    pub fn builder<T: Into<String>>(collector_endpoint: T) -> HttpTransportBuilder {
        HttpTransportBuilder {
            collector_endpoint: collector_endpoint.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
        }
    }

    fn start(
        uploader: Uploader,
        batch_size: usize,
        flush_timeout: Duration,
        max_queue_size: usize,
    ) -> Result<Self, Error> {
        let (message_sender, message_receiver) = sync_channel(max_queue_size);

        let handle = thread::Builder::new()
            .name("ZipkinHttpTransport".to_string())
            .spawn(move || {
                let mut spans: Vec<Span> = Vec::with_capacity(batch_size);
                let mut last_export_time = Instant::now();

                let export = |spans: &mut Vec<Span>| -> Result<(), Error> {
                    if spans.is_empty() {
                        return Ok(());
                    }
                    let batch = spans.split_off(0);
                    let count = batch.len();
                    tracing::debug!(spans = count, "uploading span batch");
                    uploader.upload(batch)
                };

                loop {
                    let timeout = flush_timeout.saturating_sub(last_export_time.elapsed());
                    match message_receiver.recv_timeout(timeout) {
                        Ok(BatchMessage::Span(span)) => {
                            spans.push(span);
                            if spans.len() >= batch_size
                                || last_export_time.elapsed() >= flush_timeout
                            {
                                if let Err(err) = export(&mut spans) {
                                    tracing::warn!(error = %err, "span batch upload failed");
                                }
                                last_export_time = Instant::now();
                            }
                        }
                        Ok(BatchMessage::Flush(sender)) => {
                            let result = export(&mut spans);
                            last_export_time = Instant::now();
                            let _ = sender.send(result);
                        }
                        Ok(BatchMessage::Close(sender)) => {
                            let result = export(&mut spans);
                            let _ = sender.send(result);
                            break;
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            if last_export_time.elapsed() >= flush_timeout {
                                if let Err(err) = export(&mut spans) {
                                    tracing::warn!(error = %err, "span batch upload failed");
                                }
                                last_export_time = Instant::now();
                            }
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|err| Error::Other(format!("failed to spawn transport thread: {err}")))?;

        Ok(HttpTransport {
            message_sender,
            handle: Mutex::new(Some(handle)),
            is_closed: AtomicBool::new(false),
            dropped_span_count: Arc::new(AtomicUsize::new(0)),
            batch_size,
            flush_timeout,
        })
    }

    /// The effective batch size after defaulting.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The effective flush timeout after defaulting.
    pub fn flush_timeout(&self) -> Duration {
        self.flush_timeout
    }

    /// Flush buffered spans now and wait for the upload result.
    pub fn flush(&self) -> Result<(), Error> {
        if self.is_closed.load(Ordering::Relaxed) {
            return Err(Error::TransportClosed);
        }
        let (sender, receiver) = sync_channel(1);
        self.message_sender
            .try_send(BatchMessage::Flush(sender))
            .map_err(|_| Error::QueueFull)?;
        receiver
            .recv_timeout(CLOSE_TIMEOUT)
            .map_err(|_| Error::Other("flush timed out".to_string()))?
    }

    #[cfg(test)]
    fn with_uploader(
        uploader: Uploader,
        batch_size: usize,
        flush_timeout: Duration,
        max_queue_size: usize,
    ) -> Self {
        Self::start(uploader, batch_size, flush_timeout, max_queue_size)
            .expect("failed to start transport")
    }
}

impl Transport for HttpTransport {
    fn send(&self, span: Span) -> Result<(), Error> {
        if self.is_closed.load(Ordering::Relaxed) {
            return Err(Error::TransportClosed);
        }
        if self
            .message_sender
            .try_send(BatchMessage::Span(span))
            .is_err()
        {
            if self.dropped_span_count.fetch_add(1, Ordering::Relaxed) == 0 {
                tracing::warn!(
                    "span queue is full, dropping spans until the transport catches up"
                );
            }
            return Err(Error::QueueFull);
        }
        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        if self.is_closed.swap(true, Ordering::Relaxed) {
            // Already flushed and joined by the first close.
            return Ok(());
        }

        let dropped = self.dropped_span_count.load(Ordering::Relaxed);
        if dropped > 0 {
            tracing::warn!(dropped, "spans were dropped before close");
        }

        let (sender, receiver) = sync_channel(1);
        self.message_sender
            .try_send(BatchMessage::Close(sender))
            .map_err(|_| Error::Other("failed to reach the transport thread".to_string()))?;
        let result = receiver
            .recv_timeout(CLOSE_TIMEOUT)
            .map_err(|_| Error::Other("close timed out".to_string()))?;

        if let Some(handle) = self.handle.lock().expect("transport handle poisoned").take() {
            handle
                .join()
                .map_err(|_| Error::Other("transport thread panicked".to_string()))?;
        }
        result
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    collector_endpoint: String,
    batch_size: usize,
    flush_timeout: Duration,
    max_queue_size: usize,
}

impl HttpTransportBuilder {
    /// Flush a batch once it holds this many spans. Zero selects the default
    /// of 100.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Flush a partial batch after this long. Zero selects the default of
    /// 200ms.
    pub fn with_flush_timeout(mut self, flush_timeout: Duration) -> Self {
        self.flush_timeout = flush_timeout;
        self
    }

    /// Capacity of the local span queue; spans sent while it is full are
    /// rejected.
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size.max(1);
        self
    }

    /// Validate the endpoint, spawn the background thread, and return the
    /// bound transport.
    pub fn build(self) -> Result<HttpTransport, Error> {
        let endpoint = Url::parse(&self.collector_endpoint)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?;
        let batch_size = if self.batch_size == 0 {
            env::get_batch_size()
        } else {
            self.batch_size
        };
        let flush_timeout = if self.flush_timeout.is_zero() {
            env::get_timeout()
        } else {
            self.flush_timeout
        };
        HttpTransport::start(
            Uploader::new(client, endpoint),
            batch_size,
            flush_timeout,
            self.max_queue_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporter::model::endpoint::Endpoint;
    use crate::exporter::model::span::Span;
    use crate::exporter::uploader::in_memory::InMemoryClient;

    fn test_span(name: &str) -> Span {
        Span::builder()
            .trace_id("0000000000000001".to_owned())
            .parent_id("0000000000000000".to_owned())
            .id("0000000000000002".to_owned())
            .name(name.to_owned())
            .timestamp(1)
            .duration(1)
            .local_endpoint(Endpoint::new("svc".to_owned(), None))
            .build()
    }

    fn transport_with(
        batch_size: usize,
        flush_timeout: Duration,
        queue: usize,
    ) -> (HttpTransport, InMemoryClient) {
        let client = InMemoryClient::default();
        let transport = HttpTransport::with_uploader(
            Uploader::InMemory(client.clone()),
            batch_size,
            flush_timeout,
            queue,
        );
        (transport, client)
    }

    #[test]
    fn batch_flushes_when_count_is_reached() {
        let (transport, client) = transport_with(2, Duration::from_secs(60), 16);
        transport.send(test_span("a")).unwrap();
        transport.send(test_span("b")).unwrap();
        // The batch-size trigger fires on the second send, well before the
        // one-minute timeout.
        let deadline = Instant::now() + Duration::from_secs(5);
        while client.batches().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        let batches = client.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        transport.close().unwrap();
    }

    #[test]
    fn batch_flushes_on_timeout() {
        let (transport, client) = transport_with(100, Duration::from_millis(50), 16);
        transport.send(test_span("a")).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while client.batches().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        let batches = client.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        transport.close().unwrap();
    }

    #[test]
    fn close_flushes_the_remainder() {
        let (transport, client) = transport_with(100, Duration::from_secs(60), 16);
        transport.send(test_span("a")).unwrap();
        transport.close().unwrap();
        let batches = client.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
    }

    #[test]
    fn close_without_writes_is_clean_and_idempotent() {
        let (transport, client) = transport_with(100, Duration::from_secs(60), 16);
        transport.close().unwrap();
        transport.close().unwrap();
        assert!(client.batches().is_empty());
    }

    #[test]
    fn close_surfaces_the_upload_error() {
        let (transport, client) = transport_with(100, Duration::from_secs(60), 16);
        client.fail_uploads(true);
        transport.send(test_span("a")).unwrap();
        let err = transport.close().unwrap_err();
        assert!(matches!(err, Error::Other(_)));
    }

    #[test]
    fn send_after_close_is_rejected() {
        let (transport, _client) = transport_with(100, Duration::from_secs(60), 16);
        transport.close().unwrap();
        let err = transport.send(test_span("late")).unwrap_err();
        assert!(matches!(err, Error::TransportClosed));
    }

    #[test]
    fn flush_delivers_a_partial_batch() {
        let (transport, client) = transport_with(100, Duration::from_secs(60), 16);
        transport.send(test_span("a")).unwrap();
        transport.flush().unwrap();
        let batches = client.batches();
        assert_eq!(batches.len(), 1);
        transport.close().unwrap();
    }

    #[test]
    fn zero_config_selects_the_documented_defaults() {
        temp_env::with_vars_unset(["TRACE_ZIPKIN_TIMEOUT", "TRACE_ZIPKIN_BATCH_SIZE"], || {
            let transport = HttpTransport::builder("http://127.0.0.1:9411/api/v2/spans")
                .with_batch_size(0)
                .with_flush_timeout(Duration::ZERO)
                .build()
                .unwrap();
            assert_eq!(transport.batch_size(), DEFAULT_BATCH_SIZE);
            assert_eq!(transport.flush_timeout(), DEFAULT_FLUSH_TIMEOUT);
            transport.close().unwrap();
        });
    }

    #[test]
    fn full_queue_surfaces_queue_full() {
        // Batch size one with a slow upload keeps the worker busy, so the
        // one-slot queue must fill up while it uploads.
        let (transport, client) = transport_with(1, Duration::from_secs(60), 1);
        client.delay_uploads(Duration::from_millis(500));
        let mut saw_queue_full = false;
        for i in 0..64 {
            if let Err(Error::QueueFull) = transport.send(test_span(&format!("s{i}"))) {
                saw_queue_full = true;
                break;
            }
        }
        assert!(saw_queue_full);
        client.delay_uploads(Duration::ZERO);
        let _ = transport.close();
    }
}
