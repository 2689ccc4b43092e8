use bytes::Bytes;
use http::StatusCode;
use hyperwire::codec;
use hyperwire::BoxError;

mod support;

use support::{RecordingSink, TestServer};

#[derive(Debug, serde::Deserialize, PartialEq)]
struct Summary {
    name: String,
    count: u32,
}

#[tokio::test]
async fn buffer_keeps_bytes() -> Result<(), BoxError> {
    let server = TestServer::start().await;
    let response = server.client().get("/text").send()?.await?;

    assert_eq!(response.body(), Some(&Bytes::from_static(b"hello")));
    assert_eq!(response.body_as_string().as_deref(), Some("hello"));

    Ok(())
}

#[tokio::test]
async fn string_decodes_text() -> Result<(), BoxError> {
    let server = TestServer::start().await;
    let response = server
        .client()
        .get("/text")
        .send_with(codec::string())?
        .await?;

    assert_eq!(response.body().map(String::as_str), Some("hello"));

    Ok(())
}

#[tokio::test]
async fn json_binds_to_types() -> Result<(), BoxError> {
    let server = TestServer::start().await;
    let client = server.client();

    let response = client
        .get("/json")
        .send_with(codec::json::<Summary>())?
        .await?;
    assert_eq!(
        response.into_body(),
        Some(Summary {
            name: "hyperwire".into(),
            count: 3
        })
    );

    let response = client.get("/json").send()?.await?;
    let summary: Summary = response.body_as_json()?.ok_or("missing body")?;
    assert_eq!(summary.count, 3);

    Ok(())
}

#[tokio::test]
async fn json_value_parses_documents() -> Result<(), BoxError> {
    let server = TestServer::start().await;
    let response = server
        .client()
        .get("/json")
        .send_with(codec::json_value())?
        .await?;

    assert_eq!(
        response.body(),
        Some(&serde_json::json!({"name": "hyperwire", "count": 3}))
    );

    Ok(())
}

#[tokio::test]
async fn malformed_json_is_a_decode_error() -> Result<(), BoxError> {
    let server = TestServer::start().await;
    let client = server.client();

    let error = client
        .get("/malformed")
        .send_with(codec::json_value())?
        .await
        .unwrap_err();
    assert!(error.is_decode(), "unexpected error: {error}");

    let error = client
        .get("/text")
        .send_with(codec::json::<Summary>())?
        .await
        .unwrap_err();
    assert!(error.is_decode(), "unexpected error: {error}");

    // A well-formed document of the wrong shape.
    let error = client
        .get("/echo")
        .send_with(codec::json::<Summary>())?
        .await
        .unwrap_err();
    assert!(error.is_decode(), "unexpected error: {error}");

    Ok(())
}

#[tokio::test]
async fn empty_bodies_decode_to_nothing() -> Result<(), BoxError> {
    let server = TestServer::start().await;
    let client = server.client();

    let response = client
        .get("/status/204")
        .send_with(codec::json_value())?
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.body().is_none());

    let response = client
        .get("/status/403")
        .send_with(codec::json::<Summary>())?
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.body().is_none());

    Ok(())
}

#[tokio::test]
async fn none_discards_the_body() -> Result<(), BoxError> {
    let server = TestServer::start().await;
    let response = server
        .client()
        .get("/bytes/5000")
        .send_with(codec::none())?
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.body().is_none());

    Ok(())
}

#[tokio::test]
async fn pipe_forwards_every_byte() -> Result<(), BoxError> {
    let server = TestServer::start().await;
    let sink = RecordingSink::default();

    let response = server
        .client()
        .get("/bytes/20000")
        .send_with(codec::pipe(sink.clone()))?
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.body().is_none());

    let recording = sink.recording();
    assert_eq!(recording.data.len(), 20000);
    assert!(recording.data.iter().all(|byte| *byte == b'a'));
    assert!(recording.chunks >= 1);
    assert_eq!(recording.closed, 1);

    Ok(())
}

#[tokio::test]
async fn pipe_closes_on_empty_bodies() -> Result<(), BoxError> {
    let server = TestServer::start().await;
    let sink = RecordingSink::default();

    let response = server
        .client()
        .get("/status/204")
        .send_with(codec::pipe(sink.clone()))?
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let recording = sink.recording();
    assert!(recording.data.is_empty());
    assert_eq!(recording.closed, 1);

    Ok(())
}
