use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::HeaderValue;

use super::{Client, ClientOptions, ClientRef};
use crate::body::Body;
use crate::context::Interceptor;
#[cfg(feature = "connector")]
use crate::transport::HttpConnector;
use crate::transport::SharedTransport;
use crate::BoxError;

/// A builder for a client.
pub struct Builder<T> {
    transport: T,
    interceptors: Vec<Arc<dyn Interceptor>>,
    default_host: Option<String>,
    default_port: u16,
    user_agent: Option<String>,
    timeout: Option<Duration>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Builder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("transport", &self.transport)
            .field("interceptors", &self.interceptors.len())
            .field("default_host", &self.default_host)
            .field("default_port", &self.default_port)
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Builder<()> {
    /// Create a new, empty builder
    pub fn new() -> Self {
        Self {
            transport: (),
            interceptors: Vec::new(),
            default_host: None,
            default_port: 80,
            user_agent: Some(default_user_agent()),
            timeout: None,
        }
    }
}

#[cfg(feature = "connector")]
impl Default for Builder<HttpConnector> {
    fn default() -> Self {
        Builder::new().with_transport(HttpConnector::default())
    }
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_owned()
}

impl<T> Builder<T> {
    /// Provide a custom transport
    pub fn with_transport<T2>(self, transport: T2) -> Builder<T2> {
        Builder {
            transport,
            interceptors: self.interceptors,
            default_host: self.default_host,
            default_port: self.default_port,
            user_agent: self.user_agent,
            timeout: self.timeout,
        }
    }

    /// Get a mutable reference to the transport configuration
    pub fn transport(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Add an interceptor. Interceptors run in the order they are added.
    pub fn with_interceptor<I: Interceptor>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Set the host used by requests which don't name one.
    pub fn with_default_host(mut self, host: impl Into<String>) -> Self {
        self.default_host = Some(host.into());
        self
    }

    /// Get the default host currently configured
    pub fn default_host(&self) -> Option<&str> {
        self.default_host.as_deref()
    }

    /// Set the port used by requests which don't name one.
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    /// Get the default port currently configured
    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    /// Set a user agent to be sent with each request.
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = Some(user_agent);
        self
    }

    /// Don't send a user agent unless the request sets one.
    pub fn without_user_agent(mut self) -> Self {
        self.user_agent = None;
        self
    }

    /// Get the user agent currently configured
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Set the timeout for requests.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get the timeout for requests.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Disable request timeouts.
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Set the timeout for requests with an Option.
    pub fn with_optional_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl<T, B> Builder<T>
where
    T: tower::Service<http::Request<Body>, Response = http::Response<B>>
        + Clone
        + Send
        + Sync
        + 'static,
    T::Error: Into<BoxError>,
    T::Future: Send + 'static,
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    /// Build a client.
    pub fn build(self) -> Client {
        let user_agent = self.user_agent.map(|ua| {
            HeaderValue::from_str(&ua).expect("user-agent should be a valid http header")
        });

        let options = ClientOptions {
            default_host: self.default_host,
            default_port: self.default_port,
            user_agent,
            timeout: self.timeout,
        };

        Client {
            inner: Arc::new(ClientRef {
                transport: SharedTransport::new(self.transport),
                interceptors: self.interceptors.into(),
                options: Arc::new(options),
            }),
        }
    }
}
