//! End-to-end pipeline test against a local collector stub.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use trace_zipkin::{LogField, Tag, Tracer};

/// Minimal single-request-per-connection HTTP collector. Captured request
/// bodies are handed out through the returned channel.
fn spawn_collector() -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind collector stub");
    let addr = listener.local_addr().expect("collector stub addr");
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            let sender = sender.clone();
            thread::spawn(move || handle_connection(stream, sender));
        }
    });
    (format!("http://{addr}/api/v2/spans"), receiver)
}

fn handle_connection(mut stream: TcpStream, sender: mpsc::Sender<String>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let Ok(n) = stream.read(&mut chunk) else { return };
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(body_start) = find_body_start(&buf) {
            let content_length = parse_content_length(&buf[..body_start]);
            while buf.len() < body_start + content_length {
                let Ok(n) = stream.read(&mut chunk) else { return };
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let head = String::from_utf8_lossy(&buf[..body_start]);
            assert!(
                head.starts_with("POST "),
                "expected a POST request, got: {head}"
            );
            let body =
                String::from_utf8_lossy(&buf[body_start..body_start + content_length]).to_string();
            let _ = sender.send(body);
            let _ = stream.write_all(
                b"HTTP/1.1 202 Accepted\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            );
            return;
        }
    }
}

fn find_body_start(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn parse_content_length(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())?
        })
        .unwrap_or(0)
}

#[test]
fn reports_forked_spans_to_the_collector() {
    let (endpoint, bodies) = spawn_collector();

    let (tracer1, exporter) = trace_zipkin::new_pipeline()
        .with_service_name("service1")
        .with_collector_endpoint(endpoint)
        .with_batch_size(100)
        .with_flush_timeout(Duration::from_secs(5))
        .build()
        .expect("pipeline should build");
    let tracer2 = Tracer::new("service2", vec![], exporter, true);

    let root = tracer1.span("op_1");
    let mut child = root.fork("service3", "op_client");
    child.set_tag(Tag::new(trace_zipkin::TAG_SPAN_KIND, "client"));
    child.set_log(vec![LogField::new("log_k", "log_v")]);

    let other = tracer2.span("op_2");
    other.finish().expect("finish op_2");
    child.finish().expect("finish op_client");
    root.finish().expect("finish op_1");
    tracer1.close().expect("close flushes buffered spans");

    let body = bodies
        .recv_timeout(Duration::from_secs(10))
        .expect("collector received a batch");
    let spans: serde_json::Value = serde_json::from_str(&body).expect("batch is valid JSON");
    let spans = spans.as_array().expect("batch is a JSON array");
    assert_eq!(spans.len(), 3);

    let find = |name: &str| {
        spans
            .iter()
            .find(|s| s["name"] == name)
            .unwrap_or_else(|| panic!("span {name} missing from batch"))
    };
    let root_span = find("op_1");
    let child_span = find("op_client");
    let other_span = find("op_2");

    // Root: parent id materialized as zero, no kind, empty containers.
    assert_eq!(root_span["parentId"], "0000000000000000");
    assert_eq!(root_span["localEndpoint"]["serviceName"], "service1");
    assert!(root_span.get("kind").is_none());
    assert_eq!(root_span["tags"], serde_json::json!({}));
    assert_eq!(root_span["annotations"], serde_json::json!([]));

    // Child: same trace, parented on the root, owned by the forked service.
    assert_eq!(child_span["traceId"], root_span["traceId"]);
    assert_eq!(child_span["parentId"], root_span["id"]);
    assert_eq!(child_span["localEndpoint"]["serviceName"], "service3");
    assert_eq!(child_span["kind"], "CLIENT");
    assert_eq!(child_span["tags"], serde_json::json!({}));
    assert_eq!(child_span["annotations"][0]["value"], "log_k : log_v");

    // The second tracer reports through the same transport.
    assert_eq!(other_span["localEndpoint"]["serviceName"], "service2");
    assert_ne!(other_span["traceId"], root_span["traceId"]);
}
