//! # Zipkin Reporter
//!
//! Translates spans produced by the in-process tracer into the Zipkin v2
//! wire model and delivers them to a collector endpoint in batches. See the
//! [Zipkin Docs](https://zipkin.io/) for details and deployment information.
//!
//! ## Quickstart
//!
//! First make sure you have a running version of the zipkin process you want
//! to send data to:
//!
//! ```shell
//! $ docker run -d -p 9411:9411 openzipkin/zipkin
//! ```
//!
//! Then install a pipeline with the recommended defaults to start reporting
//! spans:
//!
//! ```no_run
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tracer = trace_zipkin::new_pipeline()
//!         .with_service_name("my_app")
//!         .install()?;
//!
//!     let span = tracer.span("doing_work");
//!     // Traced app logic here...
//!     span.finish()?;
//!
//!     tracer.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Batching
//!
//! Spans are enqueued locally and posted to the collector when a batch
//! reaches the configured size (default 100) or when the flush timeout
//! elapses (default 200ms), whichever comes first. `close` flushes whatever
//! is still buffered; call it once at process shutdown.
//!
//! ## Kitchen Sink Full Configuration
//!
//! Example showing how to override all configuration options.
//!
//! ```no_run
//! use std::time::Duration;
//! use trace_zipkin::Tag;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tracer = trace_zipkin::new_pipeline()
//!         .with_service_name("my_app")
//!         .with_service_address("127.0.0.1:8080".parse()?)
//!         .with_service_tags(vec![Tag::new("version", "0.1.0")])
//!         .with_collector_endpoint("http://localhost:9411/api/v2/spans")
//!         .with_batch_size(50)
//!         .with_flush_timeout(Duration::from_millis(500))
//!         .with_disable_sample(true)
//!         .install()?;
//!
//!     let span = tracer.span("doing_work");
//!     span.finish()?;
//!     tracer.close()?;
//!     Ok(())
//! }
//! ```
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod exporter;
pub mod trace;

pub use exporter::transport::{HttpTransport, HttpTransportBuilder, Transport};
pub use exporter::{model, new_pipeline, transport, Config, Error, Exporter, ZipkinPipelineBuilder};
pub use trace::{
    global_tracer, set_global_tracer, Log, LogField, Report, Span, SpanContext, Tag, TagValue,
    TraceError, Tracer, TAG_SPAN_KIND,
};
