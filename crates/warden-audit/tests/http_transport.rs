// http_transport.rs — HttpTransport against a minimal in-process HTTP server.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use warden_audit::{
    ActionKind, Actor, AuditClient, AuditConfig, AuditEvent, AuditTransport, DeliveryError,
    EventStatus, HttpTransport,
};

struct Received {
    request_line: String,
    content_type: Option<String>,
    body: String,
}

/// Serve exactly one request, answering with `status`, and report what arrived.
fn serve_once(status: &'static str) -> (String, mpsc::Receiver<Received>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();

        let mut content_length = 0usize;
        let mut content_type = None;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                match name.trim().to_ascii_lowercase().as_str() {
                    "content-length" => content_length = value.trim().parse().unwrap(),
                    "content-type" => content_type = Some(value.trim().to_string()),
                    _ => {}
                }
            }
        }

        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).unwrap();

        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            status
        )
        .unwrap();
        stream.flush().unwrap();

        let _ = tx.send(Received {
            request_line: request_line.trim_end().to_string(),
            content_type,
            body: String::from_utf8(body).unwrap(),
        });
    });

    (url, rx)
}

fn event() -> AuditEvent {
    AuditEvent::new(
        "agent-1",
        "trace-9",
        Actor::Agent,
        ActionKind::PolicyCheck,
        "s3:CreateBucket",
        EventStatus::Denied,
    )
    .with_metadata_entry("reason", "Action denied by policy rule: s3:Delete*")
}

fn config(url: &str) -> AuditConfig {
    AuditConfig {
        request_timeout_secs: 5.0,
        ..AuditConfig::default().with_api_url(url)
    }
}

#[test]
fn posts_json_to_events_endpoint() {
    let (url, rx) = serve_once("201 Created");
    let transport = HttpTransport::new(&config(&url)).unwrap();
    let sent = event();

    transport.send(&sent).unwrap();

    let received = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(received.request_line, "POST /v1/events HTTP/1.1");
    assert_eq!(received.content_type.as_deref(), Some("application/json"));
    let decoded: AuditEvent = serde_json::from_str(&received.body).unwrap();
    assert_eq!(decoded, sent);
}

#[test]
fn non_success_status_is_a_delivery_error() {
    let (url, _rx) = serve_once("500 Internal Server Error");
    let transport = HttpTransport::new(&config(&url)).unwrap();

    match transport.send(&event()) {
        Err(DeliveryError::Status { status }) => assert_eq!(status, 500),
        other => panic!("expected Status error, got {:?}", other),
    }
}

#[test]
fn unreachable_sink_is_a_transport_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let transport = HttpTransport::new(&config(&format!("http://127.0.0.1:{}", port))).unwrap();

    assert!(matches!(
        transport.send(&event()),
        Err(DeliveryError::Transport(_))
    ));
}

#[test]
fn client_delivers_over_http_on_close() {
    let (url, rx) = serve_once("200 OK");
    let client = AuditClient::new(AuditConfig {
        flush_interval_secs: 3600.0,
        ..config(&url)
    })
    .unwrap();

    let sent = event();
    client.capture(sent.clone());
    client.close();

    let received = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    let decoded: AuditEvent = serde_json::from_str(&received.body).unwrap();
    assert_eq!(decoded.event_id, sent.event_id);
    assert_eq!(client.stats().delivered, 1);
}
