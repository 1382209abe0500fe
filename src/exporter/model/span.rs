use crate::exporter::model::{annotation::Annotation, endpoint::Endpoint};
use serde::Serialize;
use std::collections::HashMap;
use typed_builder::TypedBuilder;

/// Network role of a span, per the Zipkin v2 schema. An unspecified kind is
/// represented by omitting the field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Kind {
    /// Span covers an outbound request.
    Client,
    /// Span covers handling an inbound request.
    Server,
    /// Span covers publishing a message.
    Producer,
    /// Span covers consuming a message.
    Consumer,
}

/// A span in Zipkin v2 JSON form.
///
/// `parent_id` is always materialized, zero-valued for roots, matching the
/// source mapping; consumers that care about root detection must treat the
/// all-zero id specially. Tag and annotation containers serialize even when
/// empty.
#[derive(TypedBuilder, Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    trace_id: String,
    parent_id: String,
    id: String,
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<Kind>,
    name: String,
    timestamp: u64,
    duration: u64,
    local_endpoint: Endpoint,
    #[builder(default)]
    annotations: Vec<Annotation>,
    #[builder(default)]
    tags: HashMap<String, String>,
}

impl Span {
    /// The span's kind, if one was specified.
    pub fn kind(&self) -> Option<Kind> {
        self.kind
    }

    /// The span's tag mapping.
    pub fn tags(&self) -> &HashMap<String, String> {
        &self.tags
    }

    /// The span's annotations.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// The span's hex-encoded parent id.
    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }
}
