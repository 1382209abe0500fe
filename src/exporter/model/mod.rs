//! The Zipkin v2 wire model and the span translation into it.

use crate::trace::{self, TagValue, TAG_SPAN_KIND};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime};

/// Timestamped span annotations.
pub mod annotation;
/// Service endpoints.
pub mod endpoint;
/// The wire span itself.
pub mod span;

use annotation::annotations_from_logs;
use endpoint::Endpoint;

/// Converts a span-kind tag value into a `span::Kind`. Unrecognized values
/// map to `None`, leaving the kind unspecified rather than erroring.
fn into_zipkin_span_kind(value: &str) -> Option<span::Kind> {
    match value {
        "client" => Some(span::Kind::Client),
        "server" => Some(span::Kind::Server),
        "producer" => Some(span::Kind::Producer),
        "consumer" => Some(span::Kind::Consumer),
        _ => None,
    }
}

/// Converts a finished [`trace::Span`] into its Zipkin v2 wire form.
///
/// Total and stateless: malformed tag values are stringified, an unknown
/// span-kind value is dropped, and nothing here reads a clock, so the same
/// input always yields the same record. The span-kind tag is consumed
/// whether or not its value is recognized and never appears in the tag
/// mapping. The parent id is materialized even for roots (as zero), and only
/// the low 64 bits of a trace id exist in this mapping; both mirror the
/// source wire contract.
pub(crate) fn into_zipkin_span(span: &trace::Span, service_addr: Option<SocketAddr>) -> span::Span {
    let ctx = span.context();
    let mut kind = None;
    let mut tags = HashMap::with_capacity(span.tags().len());
    for tag in span.tags() {
        if tag.key() == TAG_SPAN_KIND {
            if let TagValue::String(value) = tag.value() {
                if let Some(k) = into_zipkin_span_kind(value) {
                    kind = Some(k);
                }
            }
        } else {
            let value = match tag.value().as_str() {
                Some(s) => s.to_owned(),
                None => tag.value().to_string(),
            };
            tags.insert(tag.key().to_owned(), value);
        }
    }

    span::Span::builder()
        .trace_id(format!("{:016x}", ctx.trace_id))
        .parent_id(format!("{:016x}", ctx.parent_id))
        .id(format!("{:016x}", ctx.span_id))
        .kind(kind)
        .name(span.operation_name().to_owned())
        .timestamp(
            span.start_time()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_else(|_| Duration::from_secs(0))
                .as_micros() as u64,
        )
        .duration(span.duration().as_micros() as u64)
        .local_endpoint(Endpoint::new(span.service_name().to_owned(), service_addr))
        .annotations(annotations_from_logs(span.logs()))
        .tags(tags)
        .build()
}
