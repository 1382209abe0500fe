//! Tracer-side span model and the reporting seam.
//!
//! A [`Tracer`] mints spans for one service and hands every finished span to
//! its [`Report`] sink. The sink is the only pluggable piece: the crate's
//! [`Exporter`](crate::Exporter) implements it on top of a Zipkin transport,
//! and tests can substitute their own.

mod span;

pub use span::{Log, LogField, Span, SpanContext, Tag, TagValue, TAG_SPAN_KIND};

use once_cell::sync::OnceCell;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by the tracing pipeline.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TraceError {
    /// Export failed with the given error.
    #[error("Exporter {name} encountered the following error(s): {0}", name = .0.exporter_name())]
    ExportFailed(Box<dyn ExportError>),

    /// Other errors propagated from the tracing pipeline.
    #[error("{0}")]
    Other(String),
}

impl From<String> for TraceError {
    fn from(msg: String) -> Self {
        TraceError::Other(msg)
    }
}

impl From<&'static str> for TraceError {
    fn from(msg: &'static str) -> Self {
        TraceError::Other(msg.to_string())
    }
}

/// Marker trait for errors raised by a span exporter.
pub trait ExportError: std::error::Error + Send + Sync + 'static {
    /// The name of the exporter that raised the error.
    fn exporter_name(&self) -> &'static str;
}

impl<T: ExportError> From<T> for TraceError {
    fn from(err: T) -> Self {
        TraceError::ExportFailed(Box::new(err))
    }
}

/// Sink for finished spans.
///
/// `write_span` must not retain the span past the call; delivery buffering,
/// if any, belongs to whatever sits behind the sink. Implementations must be
/// safe for concurrent writers.
pub trait Report: Send + Sync + Debug {
    /// Write one finished span. Errors are surfaced to the caller verbatim;
    /// no retry is attempted here.
    fn write_span(&self, span: &Span) -> Result<(), TraceError>;

    /// Flush anything buffered downstream and release resources. Called once
    /// at shutdown.
    fn close(&self) -> Result<(), TraceError>;
}

/// Mints spans for one service.
///
/// Cheap to clone; clones share the service identity, base tags, and the
/// reporter handle.
#[derive(Clone, Debug)]
pub struct Tracer {
    inner: Arc<TracerInner>,
}

#[derive(Debug)]
struct TracerInner {
    service_name: String,
    tags: Vec<Tag>,
    report: Arc<dyn Report>,
    disable_sample: bool,
}

impl Tracer {
    /// Create a tracer for `service_name` reporting through `report`.
    ///
    /// `tags` are attached to every root span the tracer mints. Sampling
    /// policy is delegated to the deployment; `disable_sample` is carried
    /// from the configuration surface and every span is recorded either way.
    pub fn new<S: Into<String>>(
        service_name: S,
        tags: Vec<Tag>,
        report: Arc<dyn Report>,
        disable_sample: bool,
    ) -> Self {
        Tracer {
            inner: Arc::new(TracerInner {
                service_name: service_name.into(),
                tags,
                report,
                disable_sample,
            }),
        }
    }

    /// The service this tracer reports for.
    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    /// Whether sampling was disabled in configuration.
    pub fn sample_disabled(&self) -> bool {
        self.inner.disable_sample
    }

    /// Start a new root span.
    pub fn span<O: Into<String>>(&self, operation: O) -> Span {
        Span::new(
            SpanContext {
                trace_id: rand_id(),
                span_id: rand_id(),
                parent_id: 0,
            },
            operation.into(),
            self.inner.service_name.clone(),
            self.inner.tags.clone(),
            Arc::clone(&self.inner.report),
        )
    }

    /// Flush and close the underlying reporter. Call once at process
    /// shutdown so buffered-but-unsent spans reach the collector.
    pub fn close(&self) -> Result<(), TraceError> {
        self.inner.report.close()
    }
}

/// Non-zero random identifier for traces and spans.
pub(crate) fn rand_id() -> u64 {
    loop {
        let id: u64 = rand::random();
        if id != 0 {
            return id;
        }
    }
}

static GLOBAL_TRACER: OnceCell<Tracer> = OnceCell::new();

/// Register the process-wide tracer. May be called once, at startup; later
/// calls fail and leave the registered tracer in place.
pub fn set_global_tracer(tracer: Tracer) -> Result<(), TraceError> {
    GLOBAL_TRACER
        .set(tracer)
        .map_err(|_| TraceError::Other("global tracer is already set".into()))
}

/// The tracer registered by [`set_global_tracer`], if any.
pub fn global_tracer() -> Option<Tracer> {
    GLOBAL_TRACER.get().cloned()
}
