use chrono::{DateTime, TimeDelta, Utc};
use harcap_core::capture::{
    CaptureTypeSet, ConnectionEvent, ConnectionId, DEFAULT_PAGE_REF, Flow, FlowFailure,
    HarRecorder, RequestData, ResponseData, ServerConnection,
};
use harcap_core::control::{ControlParams, ControlRegistry, HarControl};
use harcap_core::har::{HarReader, HarWriter};
use std::sync::Arc;
use tempfile::TempDir;

fn at(base: DateTime<Utc>, ms: i64) -> DateTime<Utc> {
    base + TimeDelta::milliseconds(ms)
}

fn get(recorder: &HarRecorder, url: &str, base: DateTime<Utc>) -> Flow {
    let mut request = RequestData::new("GET", url, base);
    request.headers = vec![
        ("Host".to_string(), "shop.example".to_string()),
        ("Cookie".to_string(), "session=abc".to_string()),
    ];
    request.ended_at = Some(at(base, 5));
    Flow::new(recorder.next_flow_id(), request)
}

fn ok(base: DateTime<Utc>, body: &str) -> ResponseData {
    ResponseData {
        status: 200,
        reason: "OK".to_string(),
        http_version: "HTTP/1.1".to_string(),
        headers: vec![
            ("Content-Type".to_string(), "text/html".to_string()),
            ("Set-Cookie".to_string(), "seen=1; Path=/; HttpOnly".to_string()),
        ],
        raw_body: body.as_bytes().to_vec(),
        body: body.as_bytes().to_vec(),
        started_at: at(base, 40),
        ended_at: at(base, 45),
    }
}

/// Test a browsing session across two pages with a reused connection and a
/// failed request
#[test]
fn test_two_page_session_exports_complete_har() {
    // Arrange
    let recorder = Arc::new(HarRecorder::with_capture_types(
        CaptureTypeSet::parse("REQUEST_CAPTURE_TYPES, RESPONSE_CAPTURE_TYPES").unwrap(),
    ));
    let base = Utc::now();
    let conn = ConnectionId(1);
    let server = ServerConnection {
        id: conn,
        ip_address: Some("203.0.113.5".parse().unwrap()),
        connected: true,
    };

    // Act - page one: two requests over the same connection
    recorder.open_page(Some("home"), Some("Home"));
    recorder.record_connection_event(conn, ConnectionEvent::ResolvingStarted, base);
    recorder.record_connection_event(conn, ConnectionEvent::ResolvingFinished, at(base, 4));
    recorder.record_connection_event(conn, ConnectionEvent::TcpConnected, at(base, 20));

    let mut first = get(&recorder, "http://shop.example/", base);
    first.server = Some(server.clone());
    let mut second = get(&recorder, "http://shop.example/style.css", base);
    second.server = Some(server);

    recorder.begin_entry(&first);
    recorder.begin_entry(&second);
    second.response = Some(ok(base, "body{}"));
    recorder.complete_entry(&second);
    first.response = Some(ok(base, "<html></html>"));
    recorder.complete_entry(&first);

    // Act - page two: a request to an unreachable host
    let home = recorder.open_page(Some("cart"), None).unwrap();
    let failed = get(&recorder, "http://nosuchhost.example:8080/cart", base);
    recorder.begin_entry(&failed);
    recorder.fail_entry(&failed, FlowFailure::ResolutionFailed, at(base, 15));

    let har = recorder.end_document().unwrap();

    // Assert - the slice for the first page
    assert_eq!(home.log.pages.len(), 1);
    assert_eq!(home.log.entries.len(), 2);

    // Assert - request order, with setup time on the first completed flow only
    assert_eq!(har.log.entries.len(), 3);
    assert_eq!(har.log.entries[0].request.url, "http://shop.example/");
    assert_eq!(har.log.entries[1].request.url, "http://shop.example/style.css");
    assert_eq!(har.log.entries[1].timings.connect, 16);
    assert_eq!(har.log.entries[1].timings.dns, 4);
    assert_eq!(har.log.entries[0].timings.connect, -1);
    assert_eq!(har.log.entries[0].time, 45);

    let first_entry = &har.log.entries[0];
    assert_eq!(first_entry.request.cookies[0].name, "session");
    assert_eq!(first_entry.response.cookies[0].http_only, Some(true));
    assert_eq!(first_entry.response.content.text, "<html></html>");
    assert_eq!(first_entry.server_ip_address.as_deref(), Some("203.0.113.5"));

    let failed_entry = &har.log.entries[2];
    assert_eq!(failed_entry.page_ref, "cart");
    assert_eq!(failed_entry.response.status, 0);
    assert_eq!(
        failed_entry.response.error_message.as_deref(),
        Some("Unable to resolve host: nosuchhost.example:8080")
    );

    // Assert - both pages are closed with their load time recorded
    assert_eq!(har.log.pages.len(), 2);
    assert!(har.log.pages.iter().all(|p| p.page_timings.on_load >= 0.0));
    assert_eq!(har.log.pages[1].title, "cart");
}

/// Test that an exported file reloads with the same shape
#[test]
fn test_exported_file_round_trips() {
    // Arrange
    let recorder = HarRecorder::new();
    let base = Utc::now();
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("session.har");

    for i in 0..4 {
        let mut flow = get(&recorder, &format!("http://shop.example/{}", i), base);
        recorder.begin_entry(&flow);
        flow.response = Some(ok(base, "x"));
        recorder.complete_entry(&flow);
    }

    // Act
    let har = recorder.end_document().unwrap();
    HarWriter::to_file(&har, &output).unwrap();
    let reloaded = HarReader::from_file(&output).unwrap();

    // Assert
    HarReader::validate(&reloaded).unwrap();
    assert_eq!(reloaded.log.entries.len(), 4);
    assert_eq!(reloaded.log.pages.len(), har.log.pages.len());
    assert_eq!(reloaded.log.pages[0].id, DEFAULT_PAGE_REF);
    for (written, read) in har.log.entries.iter().zip(&reloaded.log.entries) {
        assert_eq!(written.time, read.time);
        assert_eq!(written.timings, read.timings);
    }

    // Minimal capture leaves optional fields out
    assert!(reloaded.log.entries[0].request.headers.is_empty());
    assert!(reloaded.log.entries[0].response.content.text.is_empty());
}

/// Test the control registry end to end
#[test]
fn test_control_operations_drive_the_recorder() {
    // Arrange
    let recorder = Arc::new(HarRecorder::new());
    let mut registry = ControlRegistry::new();
    registry.register(HarControl::new(Arc::clone(&recorder)));

    // Act
    let started = registry
        .invoke("har/new_har", &ControlParams::new().with("pageRef", "Start"))
        .unwrap();
    let flow = get(&recorder, "http://shop.example/", Utc::now());
    recorder.begin_entry(&flow);
    let exported = registry
        .invoke("har/get_har", &ControlParams::new())
        .unwrap();

    // Assert
    let path = exported.path.clone().unwrap();
    let on_disk = HarReader::from_file(&path).unwrap();
    assert_eq!(on_disk.log.entries.len(), 1);
    assert_eq!(on_disk.log.entries[0].page_ref, "Start");

    for response in [started, exported] {
        if let Some(path) = response.path {
            let _ = std::fs::remove_file(path);
        }
    }
}
