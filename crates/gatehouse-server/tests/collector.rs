//! HTTP collector against a minimal local endpoint.

use gatehouse_core::{
    logbook::LogRecord,
    sync::{CollectError, Collector},
};
use gatehouse_server::{CollectorConfig, HttpCollector, ServerError};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};

/// Request as seen by the endpoint.
struct Captured {
    head: String,
    body: Vec<u8>,
}

/// Accept one connection, answer with `status` and hand back the request.
async fn serve_once(status: &'static str) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("http://{}/api.php", listener.local_addr().expect("addr"));

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];

        let head_end = loop {
            let n = socket.read(&mut chunk).await.expect("read");
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse().ok())?
            })
            .unwrap_or(0usize);
        while buf.len() < head_end + length {
            let n = socket.read(&mut chunk).await.expect("read body");
            assert!(n > 0, "connection closed before body");
            buf.extend_from_slice(&chunk[..n]);
        }

        let reply = format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        socket.write_all(reply.as_bytes()).await.expect("reply");
        socket.shutdown().await.ok();

        Captured { head, body: buf[head_end..head_end + length].to_vec() }
    });
    (url, server)
}

fn collector(url: String) -> HttpCollector {
    HttpCollector::new(&CollectorConfig { url, timeout_secs: 5 }).expect("collector")
}

fn records() -> Vec<LogRecord> {
    vec![
        LogRecord::parse("SERVICE,2024-06-15 12:00:00,SYNC message received from ID: 3"),
        LogRecord::parse("NRF_MESSAGE_HANDLER,2024-06-15 12:00:01,sending TURNON to device: 45"),
    ]
}

#[tokio::test]
async fn accepted_batch_is_posted_as_json() {
    let (url, server) = serve_once("200 OK").await;

    collector(url).push_batch(&records()).await.expect("accepted");

    let request = server.await.expect("server");
    assert!(request.head.starts_with("POST /api.php HTTP/1.1"));
    assert!(request.head.to_ascii_lowercase().contains("content-type: application/json"));

    let body: serde_json::Value = serde_json::from_slice(&request.body).expect("json body");
    assert_eq!(
        body,
        serde_json::json!([
            {
                "TAG": "SERVICE",
                "date_time": "2024-06-15 12:00:00",
                "info": "SYNC message received from ID: 3",
            },
            {
                "TAG": "NRF_MESSAGE_HANDLER",
                "date_time": "2024-06-15 12:00:01",
                "info": "sending TURNON to device: 45",
            },
        ])
    );
}

#[tokio::test]
async fn non_ok_status_is_rejected() {
    let (url, server) = serve_once("500 Internal Server Error").await;

    let err = collector(url).push_batch(&records()).await.expect_err("rejected");
    assert_eq!(err, CollectError::Rejected { status: 500 });
    server.await.expect("server");
}

#[tokio::test]
async fn other_success_codes_are_rejected_too() {
    let (url, server) = serve_once("204 No Content").await;

    let err = collector(url).push_batch(&records()).await.expect_err("rejected");
    assert_eq!(err, CollectError::Rejected { status: 204 });
    server.await.expect("server");
}

#[tokio::test]
async fn closed_port_is_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("http://{}/api.php", listener.local_addr().expect("addr"));
    drop(listener);

    let err = collector(url).push_batch(&records()).await.expect_err("unreachable");
    assert!(matches!(err, CollectError::Unreachable(_)));
}

#[test]
fn invalid_url_is_a_config_error() {
    let config = CollectorConfig { url: "not a url".to_string(), timeout_secs: 5 };
    assert!(matches!(HttpCollector::new(&config), Err(ServerError::Config(_))));
}
