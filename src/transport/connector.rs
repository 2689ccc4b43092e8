//! A minimal HTTP/1.1 transport over tokio TCP streams.
//!
//! Every request opens its own connection. The connection task is tied to
//! the response: dropping the response future or the response body aborts
//! the exchange.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_core::future::BoxFuture;
use http::Uri;
use hyper::body::Incoming;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::Instrument as _;

use super::io::TokioIo;
use crate::body::Body;
use crate::client::Error;
use crate::BoxError;

/// Configuration for [`HttpConnector`].
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Give up on establishing a TCP connection after this long.
    pub connect_timeout: Option<Duration>,

    /// Set `TCP_NODELAY` on new connections.
    pub nodelay: bool,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(10)),
            nodelay: true,
        }
    }
}

/// A transport which sends each request over a fresh HTTP/1.1 connection.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    config: Arc<ConnectorConfig>,
}

impl HttpConnector {
    /// Create a connector with the given configuration.
    pub fn new(config: ConnectorConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// The connector configuration.
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }
}

impl tower::Service<http::Request<Body>> for HttpConnector {
    type Response = http::Response<Body>;
    type Error = Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<Body>) -> Self::Future {
        Box::pin(execute(self.config.clone(), request))
    }
}

async fn execute(
    config: Arc<ConnectorConfig>,
    mut request: http::Request<Body>,
) -> Result<http::Response<Body>, Error> {
    let (host, port) = target(request.uri())?;
    let stream = connect(&config, &host, port).await?;

    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|error| Error::Connect(error.into()))?;

    let span = tracing::trace_span!("http.connection", %host, port);
    let guard = ConnectionGuard(tokio::spawn(
        async move {
            if let Err(error) = conn.await {
                tracing::debug!(%error, "connection closed with error");
            }
        }
        .instrument(span),
    ));

    origin_form(request.uri_mut());
    tracing::trace!(method = %request.method(), uri = %request.uri(), "sending request");

    let response = sender.send_request(request).await?;
    Ok(response.map(|body| {
        Body::new(GuardedBody {
            body,
            _guard: guard,
        })
    }))
}

fn target(uri: &Uri) -> Result<(String, u16), Error> {
    let host = uri
        .host()
        .ok_or_else(|| Error::Config(format!("request uri has no host: {uri}")))?;
    let host = host.trim_start_matches('[').trim_end_matches(']').to_owned();
    let port = uri.port_u16().unwrap_or(80);
    Ok((host, port))
}

async fn connect(config: &ConnectorConfig, host: &str, port: u16) -> Result<TcpStream, Error> {
    let connecting = TcpStream::connect((host, port));
    let stream = match config.connect_timeout {
        Some(timeout) => tokio::time::timeout(timeout, connecting)
            .await
            .map_err(|_| Error::Connect(format!("connecting to {host}:{port} timed out").into()))?,
        None => connecting.await,
    }
    .map_err(|error| Error::Connect(error.into()))?;

    if config.nodelay {
        stream
            .set_nodelay(true)
            .map_err(|error| Error::Connect(error.into()))?;
    }

    Ok(stream)
}

/// Convert the URI to origin-form: just the path and query, as sent on an
/// HTTP/1.1 request line.
fn origin_form(uri: &mut Uri) {
    let path = match uri.path_and_query() {
        Some(path) if path.as_str() != "/" => {
            let mut parts = http::uri::Parts::default();
            parts.path_and_query = Some(path.clone());
            Uri::from_parts(parts).unwrap_or_else(|_| Uri::from_static("/"))
        }
        _ => Uri::from_static("/"),
    };
    *uri = path;
}

/// Aborts the connection task when dropped.
struct ConnectionGuard(JoinHandle<()>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionGuard").finish()
    }
}

/// A response body which keeps its connection alive.
#[derive(Debug)]
#[pin_project::pin_project]
struct GuardedBody {
    #[pin]
    body: Incoming,
    _guard: ConnectionGuard,
}

impl http_body::Body for GuardedBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Bytes>, BoxError>>> {
        self.project()
            .body
            .poll_frame(cx)
            .map(|frame| frame.map(|res| res.map_err(|error| Error::from(error).into())))
    }

    fn is_end_stream(&self) -> bool {
        self.body.is_end_stream()
    }

    fn size_hint(&self) -> http_body::SizeHint {
        self.body.size_hint()
    }
}
