//! The entry point for making requests.
//!
//! A [`Client`] holds everything that is shared between calls: the
//! transport, the interceptor chain and a handful of defaults. It hands out
//! [`HttpRequest`] descriptors, which are configured and then sent.
//!
//! Clients are immutable once built, and cheap to clone.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderValue, Method};

use crate::codec::BodyCodec;
use crate::context::{self, Interceptor, ResponseFuture};
use crate::request::HttpRequest;
use crate::transport::SharedTransport;

mod builder;
mod error;

pub use self::builder::Builder;
pub use self::error::Error;

/// Defaults applied to every request sent by a client.
#[derive(Debug, Clone)]
pub(crate) struct ClientOptions {
    pub(crate) default_host: Option<String>,
    pub(crate) default_port: u16,
    pub(crate) user_agent: Option<HeaderValue>,
    pub(crate) timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            default_host: None,
            default_port: 80,
            user_agent: Some(HeaderValue::from_static(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))),
            timeout: None,
        }
    }
}

/// Inner type for managing the client service.
struct ClientRef {
    transport: SharedTransport,
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    options: Arc<ClientOptions>,
}

/// A high-level async HTTP client.
///
/// # Example
/// ```no_run
/// # use hyperwire::Client;
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::build_tcp_http().build();
/// let response = client.get_to("example.com", 80, "/").send()?.await?;
/// println!("Response: {:?}", response);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientRef>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("interceptors", &self.inner.interceptors.len())
            .field("options", &self.inner.options)
            .finish()
    }
}

#[cfg(feature = "connector")]
impl Default for Client {
    fn default() -> Self {
        Builder::default().build()
    }
}

impl Client {
    /// Create a new, empty builder for clients.
    pub fn builder() -> Builder<()> {
        Builder::new()
    }

    /// Create a new client builder with the TCP transport.
    #[cfg(feature = "connector")]
    pub fn build_tcp_http() -> Builder<crate::transport::HttpConnector> {
        Builder::default()
    }

    /// Create a new client with default settings over TCP.
    #[cfg(feature = "connector")]
    pub fn new_tcp_http() -> Self {
        Builder::default().build()
    }

    pub(crate) fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    pub(crate) fn execute<C>(&self, request: HttpRequest, codec: C) -> ResponseFuture<C::Output>
    where
        C: BodyCodec + 'static,
    {
        let span = tracing::debug_span!(
            "http.request",
            method = %request.get_method(),
            path = %request.get_path(),
        );

        let future = context::execute(
            self.inner.transport.clone(),
            self.inner.options.clone(),
            self.inner.interceptors.clone(),
            request,
            codec,
        );
        ResponseFuture::new(future, span)
    }
}

impl Client {
    /// Describe a request to the default host and port.
    pub fn request(&self, method: Method, path: &str) -> HttpRequest {
        HttpRequest::new(self.clone(), method, path)
    }

    /// Describe a request to `host` and `port`.
    pub fn request_to(&self, method: Method, host: &str, port: u16, path: &str) -> HttpRequest {
        let mut request = self.request(method, path);
        request.host(host).port(port);
        request
    }

    /// Describe a GET request to the default host and port.
    pub fn get(&self, path: &str) -> HttpRequest {
        self.request(Method::GET, path)
    }

    /// Describe a GET request to `host` and `port`.
    pub fn get_to(&self, host: &str, port: u16, path: &str) -> HttpRequest {
        self.request_to(Method::GET, host, port, path)
    }

    /// Describe a HEAD request to the default host and port.
    pub fn head(&self, path: &str) -> HttpRequest {
        self.request(Method::HEAD, path)
    }

    /// Describe a HEAD request to `host` and `port`.
    pub fn head_to(&self, host: &str, port: u16, path: &str) -> HttpRequest {
        self.request_to(Method::HEAD, host, port, path)
    }

    /// Describe a DELETE request to the default host and port.
    pub fn delete(&self, path: &str) -> HttpRequest {
        self.request(Method::DELETE, path)
    }

    /// Describe a DELETE request to `host` and `port`.
    pub fn delete_to(&self, host: &str, port: u16, path: &str) -> HttpRequest {
        self.request_to(Method::DELETE, host, port, path)
    }

    /// Describe a POST request to the default host and port.
    pub fn post(&self, path: &str) -> HttpRequest {
        self.request(Method::POST, path)
    }

    /// Describe a POST request to `host` and `port`.
    pub fn post_to(&self, host: &str, port: u16, path: &str) -> HttpRequest {
        self.request_to(Method::POST, host, port, path)
    }

    /// Describe a PUT request to the default host and port.
    pub fn put(&self, path: &str) -> HttpRequest {
        self.request(Method::PUT, path)
    }

    /// Describe a PUT request to `host` and `port`.
    pub fn put_to(&self, host: &str, port: u16, path: &str) -> HttpRequest {
        self.request_to(Method::PUT, host, port, path)
    }

    /// Describe a PATCH request to the default host and port.
    pub fn patch(&self, path: &str) -> HttpRequest {
        self.request(Method::PATCH, path)
    }

    /// Describe a PATCH request to `host` and `port`.
    pub fn patch_to(&self, host: &str, port: u16, path: &str) -> HttpRequest {
        self.request_to(Method::PATCH, host, port, path)
    }
}

#[cfg(test)]
mod tests {

    use static_assertions::assert_impl_all;

    use super::*;
    use crate::transport::mock::MockTransport;

    assert_impl_all!(Client: Send, Sync, Clone);

    #[test]
    fn factories_set_method_and_target() {
        let client = Client::builder().with_transport(MockTransport::ok()).build();

        let request = client.patch_to("example.com", 8080, "/items?id=4");
        assert_eq!(request.get_method(), Method::PATCH);
        assert_eq!(request.get_host(), Some("example.com"));
        assert_eq!(request.get_port(), Some(8080));
        assert_eq!(request.get_path(), "/items");
        assert_eq!(request.query().get("id"), Some("4"));

        let request = client.head("/");
        assert_eq!(request.get_method(), Method::HEAD);
        assert_eq!(request.get_host(), None);
    }

    #[test]
    fn fluent_host_overrides_factory_host() {
        let client = Client::builder().with_transport(MockTransport::ok()).build();
        let mut request = client.get_to("first.example", 80, "/");
        request.host("second.example");
        assert_eq!(request.get_host(), Some("second.example"));
    }
}
