//! A loopback HTTP/1.1 server for exercising the client end to end.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::Sink;
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt as _;
use hyper::body::Incoming;
use hyperwire::transport::TokioIo;
use hyperwire::{Body, BoxError, Client};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A test server which answers on a handful of fixed routes:
///
/// - `/echo`: a JSON description of the request,
/// - `/status/{code}`: an empty response with that status,
/// - `/bytes/{n}`: `n` bytes streamed in 1 KiB chunks,
/// - `/json`: a fixed JSON document,
/// - `/malformed`: a body which isn't JSON,
/// - `/text`: `hello`,
/// - `/slow`: a response after five seconds.
pub struct TestServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let _ = tracing_subscriber::fmt::try_init();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let service = hyper::service::service_fn(route);
                    if let Err(error) = hyper::server::conn::http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        tracing::debug!(%error, "test server connection error");
                    }
                });
            }
        });

        Self { addr, handle }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// A client whose defaults point at this server.
    pub fn client(&self) -> Client {
        Client::build_tcp_http()
            .with_default_host("127.0.0.1")
            .with_default_port(self.port())
            .build()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn route(request: Request<Incoming>) -> Result<Response<Body>, Infallible> {
    let path = request.uri().path().to_owned();
    let mut segments = path.trim_start_matches('/').splitn(2, '/');

    let response = match (segments.next(), segments.next()) {
        (Some("echo"), _) => echo(request).await,
        (Some("status"), Some(code)) => {
            let status = code
                .parse::<u16>()
                .ok()
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::BAD_REQUEST);
            response(status, Body::empty())
        }
        (Some("bytes"), Some(n)) => {
            let n: usize = n.parse().unwrap_or(0);
            let chunks = (0..n)
                .step_by(1024)
                .map(move |offset| Ok::<_, Infallible>(Bytes::from(vec![b'a'; (n - offset).min(1024)])));
            response(
                StatusCode::OK,
                Body::wrap_stream(futures_util::stream::iter(chunks)),
            )
        }
        (Some("json"), _) => response(
            StatusCode::OK,
            Body::from(r#"{"name":"hyperwire","count":3}"#),
        ),
        (Some("malformed"), _) => response(StatusCode::OK, Body::from("{not json")),
        (Some("text"), _) => response(StatusCode::OK, Body::from("hello")),
        (Some("slow"), _) => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            response(StatusCode::OK, Body::from("late"))
        }
        _ => response(StatusCode::NOT_FOUND, Body::empty()),
    };

    Ok(response)
}

fn response(status: StatusCode, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
}

async fn echo(request: Request<Incoming>) -> Response<Body> {
    let (parts, body) = request.into_parts();
    let body = body
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_default();

    let mut headers = serde_json::Map::new();
    for name in parts.headers.keys() {
        let values: Vec<_> = parts
            .headers
            .get_all(name)
            .iter()
            .map(|value| serde_json::Value::from(value.to_str().unwrap_or_default()))
            .collect();
        headers.insert(name.as_str().to_owned(), values.into());
    }

    let echo = serde_json::json!({
        "method": parts.method.as_str(),
        "path": parts.uri.path(),
        "query": parts.uri.query(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    });

    let mut response = response(StatusCode::OK, Body::from(echo.to_string()));
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    response
}

/// The first value of a header in an `/echo` response.
pub fn echoed_header<'a>(echo: &'a serde_json::Value, name: &str) -> Option<&'a str> {
    echo["headers"][name][0].as_str()
}

/// What a [`RecordingSink`] has seen.
#[derive(Debug, Default)]
pub struct Recording {
    pub data: Vec<u8>,
    pub chunks: usize,
    pub closed: usize,
}

/// A sink which records everything written to it.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    recording: Arc<Mutex<Recording>>,
}

impl RecordingSink {
    pub fn recording(&self) -> std::sync::MutexGuard<'_, Recording> {
        self.recording.lock().unwrap()
    }
}

impl Sink<Bytes> for RecordingSink {
    type Error = BoxError;

    fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Bytes) -> Result<(), Self::Error> {
        let mut recording = self.recording.lock().unwrap();
        recording.data.extend_from_slice(&item);
        recording.chunks += 1;
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.recording.lock().unwrap().closed += 1;
        Poll::Ready(Ok(()))
    }
}
