use crate::trace::Log;
use serde::Serialize;
use typed_builder::TypedBuilder;

/// A timestamped text note on a span. Log fields are carried to Zipkin as
/// annotations, one per field.
#[derive(TypedBuilder, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Microseconds since the unix epoch.
    timestamp: u64,
    value: String,
}

impl Annotation {
    /// The annotation text.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The annotation timestamp, in microseconds since the unix epoch.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

/// Converts a span's log entries into annotations, one annotation per log
/// field, entry and field order preserved. Every field of one entry carries
/// that entry's timestamp.
pub(crate) fn annotations_from_logs(logs: &[Log]) -> Vec<Annotation> {
    let mut annotations = Vec::with_capacity(logs.len());
    for log in logs {
        let timestamp = (log.timestamp / 1_000).max(0) as u64;
        for field in &log.fields {
            annotations.push(
                Annotation::builder()
                    .timestamp(timestamp)
                    .value(format!("{} : {}", field.key(), field.value_str()))
                    .build(),
            );
        }
    }
    annotations
}
