//! A [Body](http_body::Body) type used for both outgoing requests and
//! incoming responses.
//!
//! Bodies are either empty, a single buffer held in memory, or a boxed
//! stream of frames (a caller supplied stream, or a body read from the
//! transport).

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use futures_util::TryStreamExt as _;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::BodyExt;
use http_body_util::{Empty, Full, StreamBody};

use crate::BoxError;

/// A wrapper for the body types which flow through the client.
///
/// Bodies can be created from [`Bytes`](bytes::Bytes), [`String`](std::string::String),
/// `Vec<u8>` or [`&'static str`](str) using [`From`](std::convert::From) implementations,
/// or from any stream of byte chunks with [`Body::wrap_stream`].
#[derive(Debug)]
#[pin_project::pin_project]
pub struct Body {
    #[pin]
    inner: InnerBody,
}

impl Body {
    /// Create a new empty body.
    pub fn empty() -> Self {
        Self {
            inner: InnerBody::Empty,
        }
    }

    /// Create a new body from something which can be converted into [`Bytes`].
    pub fn full<D>(data: D) -> Self
    where
        D: Into<Bytes>,
    {
        let data = data.into();
        if data.is_empty() {
            return Self::empty();
        }

        Self {
            inner: InnerBody::Full(Full::new(data)),
        }
    }

    /// Create a body which yields the chunks of a stream.
    ///
    /// The length of a streamed body is unknown, so unless the request
    /// carries a `Content-Length` header it is sent with chunked encoding.
    pub fn wrap_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let frames = stream
            .map_ok(http_body::Frame::data)
            .map_err(|error| -> BoxError { error.into() });

        Self {
            inner: InnerBody::Boxed(UnsyncBoxBody::new(StreamBody::new(frames))),
        }
    }

    /// Box any other body implementation.
    pub fn new<B>(body: B) -> Self
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self {
            inner: InnerBody::Boxed(UnsyncBoxBody::new(body.map_err(Into::into))),
        }
    }

    /// Try to clone this body. Streamed bodies can't be cloned.
    pub fn try_clone(&self) -> Option<Self> {
        match &self.inner {
            InnerBody::Empty => Some(Self::empty()),
            InnerBody::Full(body) => Some(Self {
                inner: InnerBody::Full(body.clone()),
            }),
            InnerBody::Boxed(_) => None,
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Bytes> for Body {
    fn from(body: Bytes) -> Self {
        Self::full(body)
    }
}

impl From<String> for Body {
    fn from(body: String) -> Self {
        Self::full(body)
    }
}

impl From<&'static str> for Body {
    fn from(body: &'static str) -> Self {
        Self::full(body)
    }
}

impl From<Vec<u8>> for Body {
    fn from(body: Vec<u8>) -> Self {
        Self::full(body)
    }
}

impl From<Empty<Bytes>> for Body {
    fn from(_body: Empty<Bytes>) -> Self {
        Self::empty()
    }
}

impl From<hyper::body::Incoming> for Body {
    fn from(body: hyper::body::Incoming) -> Self {
        Self::new(body)
    }
}

#[pin_project::pin_project(project = InnerBodyProj)]
enum InnerBody {
    Empty,
    Full(#[pin] Full<Bytes>),
    Boxed(#[pin] UnsyncBoxBody<Bytes, BoxError>),
}

impl http_body::Body for Body {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.project().inner.project() {
            InnerBodyProj::Empty => Poll::Ready(None),
            InnerBodyProj::Full(body) => http_body::Body::poll_frame(body, cx)
                .map(|frame| frame.map(|res| res.map_err(|never| match never {}))),
            InnerBodyProj::Boxed(body) => http_body::Body::poll_frame(body, cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self.inner {
            InnerBody::Empty => true,
            InnerBody::Full(ref body) => http_body::Body::is_end_stream(body),
            InnerBody::Boxed(ref body) => http_body::Body::is_end_stream(body),
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self.inner {
            InnerBody::Empty => http_body::SizeHint::with_exact(0),
            InnerBody::Full(ref body) => http_body::Body::size_hint(body),
            InnerBody::Boxed(ref body) => http_body::Body::size_hint(body),
        }
    }
}

impl fmt::Debug for InnerBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InnerBody::Empty => f.debug_struct("Empty").finish(),
            InnerBody::Full(_) => f.debug_struct("Full").finish(),
            InnerBody::Boxed(_) => f.debug_struct("Boxed").finish(),
        }
    }
}
