use labjob_transport::{
    JobTransport, ReqwestTransport, TransportErrorKind, TransportSettings, Url,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport_for(base: &str) -> ReqwestTransport {
    let base_url = Url::parse(base).expect("base url");
    ReqwestTransport::new(TransportSettings::new(base_url)).expect("transport")
}

#[tokio::test]
async fn submit_posts_payload_and_returns_job_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .and(body_json(json!({"app": "Normalise", "target_mass": 50.0})))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"job_id": "abc123"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server.uri());
    let job_id = transport
        .submit_job(&json!({"app": "Normalise", "target_mass": 50.0}))
        .await
        .expect("submit ok");
    assert_eq!(job_id, "abc123");
}

#[tokio::test]
async fn submit_surfaces_backend_message_on_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"message": "Unknown app: Foo"})),
        )
        .mount(&server)
        .await;

    let transport = transport_for(&server.uri());
    let err = transport.submit_job(&json!({"app": "Foo"})).await.unwrap_err();
    assert_eq!(err.kind, TransportErrorKind::Submission);
    assert_eq!(err.to_string(), "Unknown app: Foo");
}

#[tokio::test]
async fn submit_falls_back_to_status_without_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let transport = transport_for(&server.uri());
    let err = transport.submit_job(&json!({})).await.unwrap_err();
    assert_eq!(err.kind, TransportErrorKind::Submission);
    assert!(err.message.contains("502"), "{}", err.message);
}

#[tokio::test]
async fn submit_rejects_response_without_job_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let transport = transport_for(&server.uri());
    let err = transport.submit_job(&json!({})).await.unwrap_err();
    assert_eq!(err.kind, TransportErrorKind::Submission);
    assert!(err.message.starts_with("malformed submit response"));
}

#[tokio::test]
async fn submit_fails_when_backend_unreachable() {
    // Nothing listens on the tcpmux port on test hosts.
    let transport = transport_for("http://127.0.0.1:1");
    let err = transport.submit_job(&json!({})).await.unwrap_err();
    assert_eq!(err.kind, TransportErrorKind::Submission);
}

#[tokio::test]
async fn cancel_hits_job_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cancel/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("abc123"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server.uri());
    transport.cancel_job("abc123").await.expect("cancel ok");
}

#[tokio::test]
async fn cancel_failure_is_a_cancellation_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cancel/abc123"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "KeyError"})))
        .mount(&server)
        .await;

    let transport = transport_for(&server.uri());
    let err = transport.cancel_job("abc123").await.unwrap_err();
    assert_eq!(err.kind, TransportErrorKind::Cancellation);
    assert_eq!(err.message, "KeyError");
}

#[tokio::test]
async fn progress_stream_delivers_events_in_order() {
    let server = MockServer::start().await;
    let body = concat!(
        "data:{\"update\": {\"status\": \"running\", \"message\": \"Iteration 1\", \"progress\": 50.0}}\n\n",
        ": keep-alive\n\n",
        "data:{\"update\": {\"status\": \"finished\", \"message\": \"Done\"}, \"result\": \"r1\"}\n\n",
    );
    Mock::given(method("GET"))
        .and(path("/progress/abc123"))
        .and(header("accept", "text/event-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let transport = transport_for(&server.uri());
    let mut stream = transport
        .open_event_stream("abc123")
        .await
        .expect("stream opens");

    let first = stream.next().await.expect("first event").expect("valid");
    assert_eq!(first.status, "running");
    assert_eq!(first.progress, Some(50.0));

    let second = stream.next().await.expect("second event").expect("valid");
    assert_eq!(second.status, "finished");
    assert_eq!(second.result.as_deref(), Some("r1"));

    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn malformed_progress_payload_is_a_stream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/progress/abc123"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("data: {not json}\n\n", "text/event-stream"),
        )
        .mount(&server)
        .await;

    let transport = transport_for(&server.uri());
    let mut stream = transport.open_event_stream("abc123").await.unwrap();
    let err = stream.next().await.expect("one item").unwrap_err();
    assert_eq!(err.kind, TransportErrorKind::Stream);
}

#[tokio::test]
async fn progress_stream_rejected_by_backend() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/progress/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let transport = transport_for(&server.uri());
    let err = transport.open_event_stream("missing").await.err().expect("open fails");
    assert_eq!(err.kind, TransportErrorKind::Stream);
}

#[tokio::test]
async fn closed_stream_yields_nothing_and_close_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/progress/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data:{\"update\": {\"status\": \"running\", \"message\": \"x\"}}\n\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let transport = transport_for(&server.uri());
    let mut stream = transport.open_event_stream("abc123").await.unwrap();
    stream.close();
    stream.close();
    assert!(stream.is_closed());
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn endpoints_resolve_below_base_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/lab/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"job_id": "j1"}"#))
        .mount(&server)
        .await;

    let transport = transport_for(&format!("{}/lab/", server.uri()));
    assert_eq!(transport.submit_job(&json!({})).await.unwrap(), "j1");
    assert_eq!(
        transport.result_url("r1"),
        format!("{}/lab/result/r1", server.uri())
    );
}
