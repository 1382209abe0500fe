use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::trace::Report;
use std::sync::Arc;

/// Tag key reserved for the span's network role. Its value selects the
/// Zipkin span kind and the tag itself is never reported.
pub const TAG_SPAN_KIND: &str = "span.kind";

/// Identifiers tying a span into its trace. A `parent_id` of zero marks a
/// root span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpanContext {
    /// Identifier shared by every span of one trace.
    pub trace_id: u64,
    /// Identifier of this span.
    pub span_id: u64,
    /// Identifier of the span this one was forked from, zero for roots.
    pub parent_id: u64,
}

/// A typed tag value.
///
/// Tag values are either textual or one of a closed set of scalar types;
/// scalars are rendered through [`fmt::Display`] when a textual form is
/// needed.
#[derive(Clone, Debug, PartialEq)]
pub enum TagValue {
    /// String values
    String(String),
    /// bool values
    Bool(bool),
    /// i64 values
    I64(i64),
    /// f64 values
    F64(f64),
}

impl TagValue {
    /// Returns the value as a `&str` if it is textual, `None` otherwise.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::String(s) => s.fmt(f),
            TagValue::Bool(b) => b.fmt(f),
            TagValue::I64(i) => i.fmt(f),
            TagValue::F64(v) => v.fmt(f),
        }
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::String(value.to_owned())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::String(value)
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        TagValue::Bool(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::I64(value)
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        TagValue::F64(value)
    }
}

/// A key/value pair attached to a span.
#[derive(Clone, Debug, PartialEq)]
pub struct Tag {
    key: String,
    value: TagValue,
}

impl Tag {
    /// Create a new tag.
    pub fn new<K: Into<String>, V: Into<TagValue>>(key: K, value: V) -> Self {
        Tag {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The tag key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The tag value.
    pub fn value(&self) -> &TagValue {
        &self.value
    }
}

/// One field of a structured log entry. Values are raw bytes and are decoded
/// as UTF-8 (lossily) when rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct LogField {
    key: String,
    value: Vec<u8>,
}

impl LogField {
    /// Create a new log field.
    pub fn new<K: Into<String>, V: Into<Vec<u8>>>(key: K, value: V) -> Self {
        LogField {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The field key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The field value, decoded as text.
    pub fn value_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }
}

/// A timestamped set of log fields attached to a span. All fields of one
/// entry share the entry's timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct Log {
    /// Nanoseconds since the unix epoch.
    pub timestamp: i64,
    /// Fields in the order they were attached.
    pub fields: Vec<LogField>,
}

/// One timed operation of a trace.
///
/// Spans are created by a [`Tracer`](crate::trace::Tracer) (or forked from
/// another span), accumulate tags and logs while open, and are handed to the
/// tracer's [`Report`] sink exactly once by [`finish`](Span::finish). Until
/// then the span is plain data; the reporter borrows it for the duration of
/// the write and never retains it.
#[derive(Clone, Debug)]
pub struct Span {
    context: SpanContext,
    operation_name: String,
    service_name: String,
    start_time: SystemTime,
    duration: Duration,
    tags: Vec<Tag>,
    logs: Vec<Log>,
    report: Arc<dyn Report>,
}

impl Span {
    pub(crate) fn new(
        context: SpanContext,
        operation_name: String,
        service_name: String,
        tags: Vec<Tag>,
        report: Arc<dyn Report>,
    ) -> Self {
        Span {
            context,
            operation_name,
            service_name,
            start_time: SystemTime::now(),
            duration: Duration::ZERO,
            tags,
            logs: Vec::new(),
            report,
        }
    }

    /// The span's trace/span/parent identifiers.
    pub fn context(&self) -> SpanContext {
        self.context
    }

    /// The operation this span times.
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    /// The service that owns this span.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// When the operation started.
    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    /// How long the operation took. Zero until the span is finished.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Tags in the order they were attached.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Log entries in the order they were attached.
    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    /// Attach a tag.
    pub fn set_tag(&mut self, tag: Tag) -> &mut Self {
        self.tags.push(tag);
        self
    }

    /// Attach a log entry timestamped now.
    pub fn set_log(&mut self, fields: Vec<LogField>) -> &mut Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as i64;
        self.set_log_at(timestamp, fields)
    }

    /// Attach a log entry with an explicit nanosecond epoch timestamp.
    pub fn set_log_at(&mut self, timestamp: i64, fields: Vec<LogField>) -> &mut Self {
        self.logs.push(Log { timestamp, fields });
        self
    }

    /// Fork a child span, optionally under a different service. The child
    /// shares this span's trace id and reporter; its parent id is this
    /// span's id.
    pub fn fork<S: Into<String>, O: Into<String>>(&self, service_name: S, operation: O) -> Span {
        Span::new(
            SpanContext {
                trace_id: self.context.trace_id,
                span_id: super::rand_id(),
                parent_id: self.context.span_id,
            },
            operation.into(),
            service_name.into(),
            Vec::new(),
            Arc::clone(&self.report),
        )
    }

    /// Finalize the span's duration and hand it to the reporter.
    ///
    /// Any error is the reporter's own, surfaced unchanged; translation of
    /// the span itself cannot fail.
    pub fn finish(mut self) -> Result<(), super::TraceError> {
        self.duration = self.start_time.elapsed().unwrap_or_default();
        self.report.write_span(&self)
    }
}
