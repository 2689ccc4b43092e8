use thiserror::Error;

use crate::BoxError;

/// Client error type.
///
/// Configuration errors are reported before a request reaches the transport.
/// Every other kind is delivered exactly once, as the output of the response
/// future.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The request could not be turned into a dispatchable call, for example
    /// because no host could be resolved.
    #[error("configuration: {0}")]
    Config(String),

    /// The transport could not establish the exchange.
    #[error("connect: {0}")]
    Connect(#[source] BoxError),

    /// The exchange failed after it was established, e.g. the connection was
    /// reset while a body was streaming.
    #[error("transport: {0}")]
    Transport(#[source] BoxError),

    /// No terminal result arrived within the configured duration.
    #[error("request timeout")]
    Timeout,

    /// The response body could not be decoded by the selected codec.
    #[error("decode: {0}")]
    Decode(#[source] BoxError),

    /// The request body could not be encoded.
    #[error("encode: {0}")]
    Encode(#[source] BoxError),

    /// The sink a response body was piped into failed.
    #[error("sink: {0}")]
    Sink(#[source] BoxError),

    /// An interceptor failed the call on purpose.
    #[error("interceptor: {0}")]
    Interceptor(#[source] BoxError),
}

impl Error {
    /// Create an error which an interceptor can use to fail a call.
    pub fn interceptor<E: Into<BoxError>>(error: E) -> Self {
        Error::Interceptor(error.into())
    }

    /// Classify an error produced by a transport.
    ///
    /// `Error` values pass through unchanged, hyper errors are sorted by
    /// what went wrong, and anything else is a transport failure.
    pub fn from_transport(error: BoxError) -> Self {
        let error = match error.downcast::<Error>() {
            Ok(error) => return *error,
            Err(error) => error,
        };

        let error = match error.downcast::<hyper::Error>() {
            Ok(error) => return Error::from(*error),
            Err(error) => error,
        };

        match error.downcast::<std::io::Error>() {
            Ok(error) if is_connect_io_error(&error) => Error::Connect(error),
            Ok(error) => Error::Transport(error),
            Err(error) => Error::Transport(error),
        }
    }

    /// Returns true if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Returns true if the exchange could not be established.
    pub fn is_connect(&self) -> bool {
        matches!(self, Error::Connect(_))
    }

    /// Returns true if the exchange failed mid-transfer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Returns true if the call timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }

    /// Returns true if the response body could not be decoded.
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode(_))
    }

    /// Returns true if a pipe sink failed.
    pub fn is_sink(&self) -> bool {
        matches!(self, Error::Sink(_))
    }
}

impl From<hyper::Error> for Error {
    fn from(error: hyper::Error) -> Self {
        if error.is_timeout() {
            Error::Timeout
        } else {
            Error::Transport(error.into())
        }
    }
}

fn is_connect_io_error(error: &std::io::Error) -> bool {
    use std::io::ErrorKind;

    matches!(
        error.kind(),
        ErrorKind::ConnectionRefused | ErrorKind::AddrNotAvailable | ErrorKind::NotFound
    )
}
