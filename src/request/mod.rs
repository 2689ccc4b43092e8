//! Declarative request descriptors.
//!
//! An [`HttpRequest`] is obtained from a [`Client`] and configured in place,
//! in the style of [`std::process::Command`]:
//!
//! ```no_run
//! # async fn run() -> Result<(), hyperwire::Error> {
//! let client = hyperwire::Client::build_tcp_http()
//!     .with_default_host("example.com")
//!     .build();
//!
//! let response = client
//!     .get("/search")
//!     .add_query_param("q", "rust")
//!     .put_header("accept", "application/json")
//!     .send()?
//!     .await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```
//!
//! Nothing happens until one of the `send` methods is called. Each send
//! dispatches an independent call, so a descriptor can be sent repeatedly.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use futures_core::Stream;
use http::header::{HOST, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde::Serialize;

use crate::body::Body;
use crate::client::{Client, ClientOptions, Error};
use crate::codec::{self, BodyCodec, Form, Multipart, Payload};
use crate::context::ResponseFuture;
use crate::BoxError;

mod query;

pub use self::query::QueryParams;

/// The description of a request to be sent.
pub struct HttpRequest {
    client: Client,
    method: Method,
    host: Option<String>,
    port: Option<u16>,
    path: String,
    query: QueryParams,
    headers: HeaderMap,
    timeout: Option<Duration>,
    body: Option<Payload>,
    error: Option<String>,
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("timeout", &self.timeout)
            .field("body", &self.body)
            .finish()
    }
}

impl HttpRequest {
    pub(crate) fn new(client: Client, method: Method, path: &str) -> Self {
        let mut request = Self {
            client,
            method,
            host: None,
            port: None,
            path: String::new(),
            query: QueryParams::new(),
            headers: HeaderMap::new(),
            timeout: None,
            body: None,
            error: None,
        };
        request.uri(path);
        request
    }

    /// Duplicate this request.
    ///
    /// Every field is copied except a streamed body, which can only be sent
    /// once.
    pub fn copy(&self) -> Self {
        Self {
            client: self.client.clone(),
            method: self.method.clone(),
            host: self.host.clone(),
            port: self.port,
            path: self.path.clone(),
            query: self.query.clone(),
            headers: self.headers.clone(),
            timeout: self.timeout,
            body: self.body.as_ref().and_then(Payload::try_clone),
            error: self.error.clone(),
        }
    }

    /// Set the request method.
    pub fn method(&mut self, method: Method) -> &mut Self {
        self.method = method;
        self
    }

    /// Set the host, overriding the client's default host.
    pub fn host(&mut self, host: impl Into<String>) -> &mut Self {
        self.host = Some(host.into());
        self
    }

    /// Set the port, overriding the client's default port.
    pub fn port(&mut self, port: u16) -> &mut Self {
        self.port = Some(port);
        self
    }

    /// Set the path.
    ///
    /// A query string in `path` replaces the query parameters. Without one,
    /// the query parameters are cleared.
    pub fn uri(&mut self, path: &str) -> &mut Self {
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path, None),
        };

        self.path = if path.starts_with('/') {
            path.to_owned()
        } else {
            format!("/{path}")
        };
        self.query = query.map(QueryParams::parse).unwrap_or_default();
        self
    }

    /// Append a query parameter, keeping existing values for `key`.
    pub fn add_query_param(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.query.add(key, value);
        self
    }

    /// Replace every value of the query parameter `key` with `value`.
    pub fn set_query_param(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.query.set(key, value);
        self
    }

    /// Set a header, replacing any existing values.
    pub fn put_header<K, V>(&mut self, name: K, value: V) -> &mut Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        if let Some((name, value)) = self.header_pair(name, value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Append a header, keeping any existing values.
    pub fn add_header<K, V>(&mut self, name: K, value: V) -> &mut Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        if let Some((name, value)) = self.header_pair(name, value) {
            self.headers.append(name, value);
        }
        self
    }

    fn header_pair<K, V>(&mut self, name: K, value: V) -> Option<(HeaderName, HeaderValue)>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let name: Result<HeaderName, http::Error> = HeaderName::try_from(name).map_err(Into::into);
        let value: Result<HeaderValue, http::Error> =
            HeaderValue::try_from(value).map_err(Into::into);

        match (name, value) {
            (Ok(name), Ok(value)) => Some((name, value)),
            (Err(error), _) | (_, Err(error)) => {
                self.error.get_or_insert_with(|| format!("invalid header: {error}"));
                None
            }
        }
    }

    /// Bound every attempt of this request, overriding the client's default
    /// timeout.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the body, to be sent with [`send`][Self::send] or
    /// [`send_with`][Self::send_with].
    pub fn with_body(&mut self, payload: impl Into<Payload>) -> &mut Self {
        self.body = Some(payload.into());
        self
    }

    /// The request method.
    pub fn get_method(&self) -> &Method {
        &self.method
    }

    /// The host set on this request, if any.
    pub fn get_host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// The port set on this request, if any.
    pub fn get_port(&self) -> Option<u16> {
        self.port
    }

    /// The request path, without the query string.
    pub fn get_path(&self) -> &str {
        &self.path
    }

    /// The per-request timeout, if any.
    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The request body, if any.
    pub fn get_body(&self) -> Option<&Payload> {
        self.body.as_ref()
    }

    /// The query parameters.
    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// Mutable access to the query parameters.
    pub fn query_mut(&mut self) -> &mut QueryParams {
        &mut self.query
    }

    /// The request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the request headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn resolve_host(&self, options: &ClientOptions) -> Result<String, Error> {
        if let Some(error) = &self.error {
            return Err(Error::Config(error.clone()));
        }

        self.host
            .clone()
            .or_else(|| options.default_host.clone())
            .ok_or_else(|| {
                Error::Config(format!(
                    "no host for {} {}: set one on the request or the client",
                    self.method, self.path
                ))
            })
    }

    /// Resolve the target URI and the headers to send, without the body.
    fn resolve(&self, options: &ClientOptions) -> Result<(Uri, HeaderMap), Error> {
        let host = self.resolve_host(options)?;
        let port = self.port.unwrap_or(options.default_port);

        let authority = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host
        };

        let mut uri = format!("http://{authority}:{port}{}", self.path);
        if !self.query.is_empty() {
            uri.push('?');
            uri.push_str(&self.query.encode());
        }
        let uri: Uri = uri
            .parse()
            .map_err(|error| Error::Config(format!("invalid request uri {uri:?}: {error}")))?;

        let mut headers = self.headers.clone();
        if !headers.contains_key(HOST) {
            let value = if port == 80 {
                authority
            } else {
                format!("{authority}:{port}")
            };
            let value = HeaderValue::try_from(value)
                .map_err(|error| Error::Config(format!("invalid host: {error}")))?;
            headers.insert(HOST, value);
        }
        if let Some(agent) = &options.user_agent {
            if !headers.contains_key(USER_AGENT) {
                headers.insert(USER_AGENT, agent.clone());
            }
        }

        Ok((uri, headers))
    }

    /// Resolve this descriptor into a request for the transport.
    ///
    /// A streamed body is moved into the returned request, other bodies are
    /// encoded from a copy so that the descriptor can be dispatched again.
    pub(crate) fn to_http(&mut self, options: &ClientOptions) -> Result<http::Request<Body>, Error> {
        let (uri, mut headers) = self.resolve(options)?;

        let payload = if self.body.as_ref().is_some_and(Payload::is_stream) {
            self.body.take()
        } else {
            self.body.as_ref().and_then(Payload::try_clone)
        };
        let body = match payload {
            Some(payload) => codec::encode(payload, &mut headers)?,
            None => Body::empty(),
        };

        let mut request = http::Request::new(body);
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = uri;
        *request.headers_mut() = headers;
        Ok(request)
    }

    /// Send the request, buffering the response body.
    pub fn send(&mut self) -> Result<ResponseFuture<Bytes>, Error> {
        self.send_with(codec::buffer())
    }

    /// Send the request, decoding the response body with `codec`.
    ///
    /// Configuration errors, such as a missing host, an unparsable path or
    /// an invalid header, are returned before anything is dispatched. Every
    /// other error is the output of the returned future.
    pub fn send_with<C>(&mut self, codec: C) -> Result<ResponseFuture<C::Output>, Error>
    where
        C: BodyCodec + 'static,
    {
        self.resolve(self.client.options())?;

        let mut request = self.copy();
        if self.body.as_ref().is_some_and(Payload::is_stream) {
            request.body = self.body.take();
        }

        Ok(self.client.execute(request, codec))
    }

    /// Send `bytes` as the body.
    pub fn send_buffer(&mut self, bytes: impl Into<Bytes>) -> Result<ResponseFuture<Bytes>, Error> {
        self.with_body(Payload::Bytes(bytes.into())).send()
    }

    /// Serialize `value` and send it as a JSON body.
    pub fn send_json<T>(&mut self, value: &T) -> Result<ResponseFuture<Bytes>, Error>
    where
        T: Serialize + ?Sized,
    {
        let payload = Payload::json(value)?;
        self.with_body(payload).send()
    }

    /// Send a JSON document as the body.
    pub fn send_json_value(&mut self, value: serde_json::Value) -> Result<ResponseFuture<Bytes>, Error> {
        self.with_body(value).send()
    }

    /// Send form fields as the body.
    pub fn send_form(&mut self, form: Form) -> Result<ResponseFuture<Bytes>, Error> {
        self.with_body(form).send()
    }

    /// Send a multipart form as the body.
    pub fn send_multipart(&mut self, multipart: Multipart) -> Result<ResponseFuture<Bytes>, Error> {
        self.with_body(multipart).send()
    }

    /// Stream the body from `stream`.
    ///
    /// Set a `Content-Length` header beforehand if the length is known,
    /// otherwise the body is sent with chunked encoding.
    pub fn send_stream<S, E>(&mut self, stream: S) -> Result<ResponseFuture<Bytes>, Error>
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        self.with_body(Payload::stream(stream)).send()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::header::CONTENT_TYPE;
    use http_body_util::BodyExt as _;

    use crate::transport::mock::MockTransport;

    fn client() -> Client {
        Client::builder().with_transport(MockTransport::ok()).build()
    }

    fn options(host: Option<&str>) -> ClientOptions {
        ClientOptions {
            default_host: host.map(str::to_owned),
            ..ClientOptions::default()
        }
    }

    #[test]
    fn request_host_wins_over_default() {
        let mut request = client().get("/path");
        request.host("request.example").port(8080);

        let http = request.to_http(&options(Some("default.example"))).unwrap();
        assert_eq!(http.uri(), "http://request.example:8080/path");
        assert_eq!(http.headers()[HOST], "request.example:8080");
    }

    #[test]
    fn default_host_and_port() {
        let mut request = client().get("/path");
        let http = request.to_http(&options(Some("default.example"))).unwrap();
        assert_eq!(http.uri(), "http://default.example:80/path");
        assert_eq!(http.headers()[HOST], "default.example");
        assert!(http.headers().contains_key(USER_AGENT));
    }

    #[test]
    fn missing_host_is_a_config_error() {
        let mut request = client().get("/path");
        let error = request.to_http(&options(None)).unwrap_err();
        assert!(error.is_config());

        let error = request.send().unwrap_err();
        assert!(error.is_config());
    }

    #[test]
    fn ipv6_hosts_are_bracketed() {
        let mut request = client().get("/");
        request.host("::1").port(9000);
        let http = request.to_http(&options(None)).unwrap();
        assert_eq!(http.uri(), "http://[::1]:9000/");
    }

    #[test]
    fn query_params_append_and_set() {
        let mut request = client().get("/?a=1");
        request
            .add_query_param("p", "a")
            .add_query_param("p", "b")
            .set_query_param("a", "2");

        let http = request.to_http(&options(Some("h"))).unwrap();
        assert_eq!(http.uri().query(), Some("p=a&p=b&a=2"));

        request.set_query_param("p", "c").add_query_param("p", "d");
        assert_eq!(request.query().encode(), "a=2&p=c&p=d");
    }

    #[test]
    fn uri_replaces_query() {
        let mut request = client().get("/a?x=1");
        request.uri("/b?x=1");
        assert_eq!(request.get_path(), "/b");
        assert_eq!(request.query().encode(), "x=1");

        request.uri("/c");
        assert_eq!(request.get_path(), "/c");
        assert!(request.query().is_empty());
    }

    #[test]
    fn unparsable_targets_fail_on_send() {
        let mut request = client().get("/a b");
        request.host("localhost");
        let error = request.send().unwrap_err();
        assert!(error.is_config());
        assert!(error.to_string().contains("invalid request uri"));

        let mut request = client().get("/");
        request.host("bad\nhost");
        assert!(request.send().unwrap_err().is_config());
    }

    #[test]
    fn headers_put_and_add() {
        let mut request = client().get("/");
        request
            .add_header("x-multi", "1")
            .add_header("x-multi", "2")
            .put_header("x-single", "1")
            .put_header("x-single", "2");

        let values: Vec<_> = request.headers().get_all("x-multi").iter().collect();
        assert_eq!(values, ["1", "2"]);
        assert_eq!(request.headers()["x-single"], "2");
    }

    #[test]
    fn invalid_headers_surface_on_send() {
        let mut request = client().get("/");
        request.host("localhost").put_header("bad header", "value");
        assert!(request.send().unwrap_err().is_config());
    }

    #[test]
    fn explicit_user_agent_is_kept() {
        let mut request = client().get("/");
        request.put_header(USER_AGENT, "custom/1.0");
        let http = request.to_http(&options(Some("h"))).unwrap();
        assert_eq!(http.headers()[USER_AGENT], "custom/1.0");
    }

    #[tokio::test]
    async fn bodies_survive_repeated_resolution() {
        let mut request = client().post("/");
        request.with_body(serde_json::json!({"a": 1}));

        for _ in 0..2 {
            let http = request.to_http(&options(Some("h"))).unwrap();
            assert_eq!(http.headers()[CONTENT_TYPE], "application/json");
            let body = http.into_body().collect().await.unwrap().to_bytes();
            assert_eq!(body, Bytes::from_static(br#"{"a":1}"#));
        }
    }

    #[test]
    fn streams_are_taken_once() {
        let mut request = client().post("/");
        request.with_body(Payload::stream(futures_util::stream::iter([Ok::<_, BoxError>(
            Bytes::from_static(b"chunk"),
        )])));

        let copy = request.copy();
        assert!(copy.get_body().is_none());

        request.to_http(&options(Some("h"))).unwrap();
        assert!(request.get_body().is_none());
    }

    #[test]
    fn copy_duplicates_fields() {
        let mut request = client().put("/items?x=1");
        request
            .host("example.com")
            .port(81)
            .timeout(Duration::from_secs(1))
            .put_header("x-a", "b")
            .with_body(Bytes::from_static(b"data"));

        let copy = request.copy();
        assert_eq!(copy.get_method(), Method::PUT);
        assert_eq!(copy.get_host(), Some("example.com"));
        assert_eq!(copy.get_port(), Some(81));
        assert_eq!(copy.get_path(), "/items");
        assert_eq!(copy.query().get("x"), Some("1"));
        assert_eq!(copy.get_timeout(), Some(Duration::from_secs(1)));
        assert_eq!(copy.headers()["x-a"], "b");
        assert!(matches!(copy.get_body(), Some(Payload::Bytes(_))));
    }
}
