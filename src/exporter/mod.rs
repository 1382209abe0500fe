mod env;
pub mod model;
pub mod transport;
mod uploader;

use crate::trace::{set_global_tracer, ExportError, Report, Tracer, TraceError};
use model::into_zipkin_span;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use transport::{HttpTransport, Transport, DEFAULT_MAX_QUEUE_SIZE};

/// Default service name if no service is configured.
const DEFAULT_SERVICE_NAME: &str = "unknown-service";

/// Reporter adapter between the tracer and a Zipkin transport.
///
/// Translates each finished span into its wire form and forwards it to the
/// transport's queue. Holds no mutable state of its own, so any number of
/// threads may write through it concurrently; transport errors are surfaced
/// to the caller verbatim and never retried here.
#[derive(Debug)]
pub struct Exporter {
    transport: Box<dyn Transport>,
    service_addr: Option<SocketAddr>,
}

impl Exporter {
    /// Create an exporter forwarding to the given transport.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Exporter {
            transport,
            service_addr: None,
        }
    }

    /// Report this address on every span's local endpoint.
    pub fn with_service_address(mut self, addr: SocketAddr) -> Self {
        self.service_addr = Some(addr);
        self
    }
}

impl Report for Exporter {
    fn write_span(&self, span: &crate::trace::Span) -> Result<(), TraceError> {
        self.transport
            .send(into_zipkin_span(span, self.service_addr))
            .map_err(Into::into)
    }

    fn close(&self) -> Result<(), TraceError> {
        self.transport.close().map_err(Into::into)
    }
}

/// Exporter settings as loaded from a configuration source.
///
/// Zero values select the defaults (batch size 100, timeout 200ms); a
/// missing endpoint is a fatal configuration error at install time.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Collector endpoint URL the spans are sent to.
    pub endpoint: String,
    /// Spans per batch, 0 selects the default of 100.
    pub batch_size: usize,
    /// Flush interval in milliseconds, 0 selects the default of 200.
    pub timeout: u64,
    /// Passed through to the tracer; sampling policy is not applied here.
    pub disable_sample: bool,
}

/// Create a new Zipkin pipeline builder.
pub fn new_pipeline() -> ZipkinPipelineBuilder {
    ZipkinPipelineBuilder::default()
}

/// Builder assembling the transport, exporter, and tracer.
#[derive(Debug)]
pub struct ZipkinPipelineBuilder {
    service_name: String,
    service_addr: Option<SocketAddr>,
    service_tags: Vec<crate::trace::Tag>,
    collector_endpoint: String,
    batch_size: usize,
    timeout: Duration,
    max_queue_size: usize,
    disable_sample: bool,
}

impl Default for ZipkinPipelineBuilder {
    fn default() -> Self {
        ZipkinPipelineBuilder {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            service_addr: None,
            service_tags: Vec::new(),
            collector_endpoint: env::get_endpoint(),
            batch_size: env::get_batch_size(),
            timeout: env::get_timeout(),
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            disable_sample: false,
        }
    }
}

impl ZipkinPipelineBuilder {
    /// Assign the service name under which to group traces.
    pub fn with_service_name<T: Into<String>>(mut self, name: T) -> Self {
        self.service_name = name.into();
        self
    }

    /// Assign the local service address.
    pub fn with_service_address(mut self, addr: SocketAddr) -> Self {
        self.service_addr = Some(addr);
        self
    }

    /// Attach these tags to every root span.
    pub fn with_service_tags(mut self, tags: Vec<crate::trace::Tag>) -> Self {
        self.service_tags = tags;
        self
    }

    /// Assign the Zipkin collector endpoint.
    pub fn with_collector_endpoint<T: Into<String>>(mut self, endpoint: T) -> Self {
        self.collector_endpoint = endpoint.into();
        self
    }

    /// Spans per batch; 0 selects the default of 100.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Flush interval of the batching transport; zero selects the default
    /// of 200ms.
    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Capacity of the local span queue.
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Whether the tracer should bypass sampling.
    pub fn with_disable_sample(mut self, disable_sample: bool) -> Self {
        self.disable_sample = disable_sample;
        self
    }

    /// Apply a loaded [`Config`].
    pub fn with_config(mut self, config: Config) -> Self {
        self.collector_endpoint = config.endpoint;
        self.batch_size = config.batch_size;
        self.timeout = Duration::from_millis(config.timeout);
        self.disable_sample = config.disable_sample;
        self
    }

    /// Build the transport, exporter, and tracer without touching the global
    /// registration. The exporter handle is shared, so further tracers for
    /// other services can report through the same transport.
    pub fn build(self) -> Result<(Tracer, Arc<Exporter>), TraceError> {
        if self.collector_endpoint.is_empty() {
            return Err(Error::MissingEndpoint.into());
        }
        let transport = HttpTransport::builder(self.collector_endpoint)
            .with_batch_size(self.batch_size)
            .with_flush_timeout(self.timeout)
            .with_max_queue_size(self.max_queue_size)
            .build()?;
        let mut exporter = Exporter::new(Box::new(transport));
        if let Some(addr) = self.service_addr {
            exporter = exporter.with_service_address(addr);
        }
        let exporter = Arc::new(exporter);
        let tracer = Tracer::new(
            self.service_name,
            self.service_tags,
            exporter.clone() as Arc<dyn Report>,
            self.disable_sample,
        );
        Ok((tracer, exporter))
    }

    /// Build the pipeline and register its tracer as the process-wide
    /// tracer. Fails if the configuration is unusable or a global tracer is
    /// already registered.
    pub fn install(self) -> Result<Tracer, TraceError> {
        let (tracer, _exporter) = self.build()?;
        set_global_tracer(tracer.clone())?;
        Ok(tracer)
    }
}

/// Wrap type for errors from the zipkin exporter.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The configured collector endpoint is not a valid URL.
    #[error("invalid collector endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// No collector endpoint was configured.
    #[error("collector endpoint must be configured")]
    MissingEndpoint,

    /// Http requests failed
    #[error("http request failed with {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The span batch could not be serialized.
    #[error("failed to serialize spans: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The local span queue is full; the span was dropped.
    #[error("span queue is full")]
    QueueFull,

    /// The transport was already closed.
    #[error("transport is closed")]
    TransportClosed,

    /// Other errors
    #[error("export error: {0}")]
    Other(String),
}

impl ExportError for Error {
    fn exporter_name(&self) -> &'static str {
        "zipkin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{SpanContext, Tag};
    use std::sync::Mutex;

    #[derive(Clone, Debug, Default)]
    struct MockTransport {
        sent: Arc<Mutex<Vec<model::span::Span>>>,
        fail_close: bool,
    }

    impl Transport for MockTransport {
        fn send(&self, span: model::span::Span) -> Result<(), Error> {
            self.sent.lock().unwrap().push(span);
            Ok(())
        }

        fn close(&self) -> Result<(), Error> {
            if self.fail_close {
                Err(Error::Other("flush failed".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn test_span(report: Arc<dyn Report>) -> crate::trace::Span {
        crate::trace::Span::new(
            SpanContext {
                trace_id: 1,
                span_id: 2,
                parent_id: 0,
            },
            "op".to_owned(),
            "svc".to_owned(),
            vec![Tag::new("k", "v")],
            report,
        )
    }

    #[test]
    fn write_span_translates_and_forwards() {
        let mock = MockTransport::default();
        let exporter = Arc::new(Exporter::new(Box::new(mock.clone())));
        let span = test_span(exporter.clone());
        span.finish().unwrap();
        let sent = mock.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].tags().get("k").map(String::as_str), Some("v"));
        assert_eq!(sent[0].parent_id(), "0000000000000000");
    }

    #[test]
    fn close_propagates_the_transport_error() {
        let exporter = Exporter::new(Box::new(MockTransport {
            fail_close: true,
            ..Default::default()
        }));
        let err = exporter.close().unwrap_err();
        assert!(err.to_string().contains("flush failed"));
    }

    #[test]
    fn close_without_writes_is_clean() {
        let exporter = Exporter::new(Box::new(MockTransport::default()));
        exporter.close().unwrap();
    }

    #[test]
    fn config_deserializes_camel_case() {
        let config: Config = serde_json::from_str(
            "{\"endpoint\":\"http://127.0.0.1:9411/api/v2/spans\",\"batchSize\":50,\"timeout\":300,\"disableSample\":true}",
        )
        .unwrap();
        assert_eq!(config.endpoint, "http://127.0.0.1:9411/api/v2/spans");
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.timeout, 300);
        assert!(config.disable_sample);
    }

    #[test]
    fn missing_endpoint_is_fatal() {
        let result = new_pipeline().with_config(Config::default()).build();
        assert!(result.is_err());
    }

    #[test]
    fn invalid_endpoint_is_fatal() {
        let result = new_pipeline().with_collector_endpoint("not a url").build();
        assert!(result.is_err());
    }
}
