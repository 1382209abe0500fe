use std::env;
use std::time::Duration;

use crate::exporter::transport::{DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_TIMEOUT};

/// Default Zipkin collector endpoint
const DEFAULT_COLLECTOR_ENDPOINT: &str = "http://127.0.0.1:9411/api/v2/spans";

/// HTTP endpoint for the Zipkin collector.
/// e.g. "http://localhost:9411/api/v2/spans"
const ENV_ENDPOINT: &str = "TRACE_ZIPKIN_ENDPOINT";

/// Flush interval of the batching transport, in milliseconds.
const ENV_TIMEOUT: &str = "TRACE_ZIPKIN_TIMEOUT";

/// Number of spans per batch.
const ENV_BATCH_SIZE: &str = "TRACE_ZIPKIN_BATCH_SIZE";

pub(crate) fn get_timeout() -> Duration {
    match env::var(ENV_TIMEOUT).ok().filter(|var| !var.is_empty()) {
        Some(timeout) => match timeout.parse() {
            Ok(timeout) => Duration::from_millis(timeout),
            Err(e) => {
                eprintln!("{} malformed defaulting to 200: {}", ENV_TIMEOUT, e);
                DEFAULT_FLUSH_TIMEOUT
            }
        },
        None => DEFAULT_FLUSH_TIMEOUT,
    }
}

pub(crate) fn get_batch_size() -> usize {
    match env::var(ENV_BATCH_SIZE).ok().filter(|var| !var.is_empty()) {
        Some(batch_size) => match batch_size.parse() {
            Ok(0) | Err(_) => DEFAULT_BATCH_SIZE,
            Ok(batch_size) => batch_size,
        },
        None => DEFAULT_BATCH_SIZE,
    }
}

pub(crate) fn get_endpoint() -> String {
    match env::var(ENV_ENDPOINT).ok().filter(|var| !var.is_empty()) {
        Some(endpoint) => endpoint,
        None => DEFAULT_COLLECTOR_ENDPOINT.to_string(),
    }
}
