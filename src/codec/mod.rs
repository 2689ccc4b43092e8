//! Body codecs: turning request values into bodies, and response bodies into
//! values.
//!
//! Request payloads are described by [`Payload`] and encoded when the request
//! is dispatched. Responses are decoded by a [`BodyCodec`] chosen per call:
//!
//! - [`buffer`] keeps the bytes,
//! - [`string`] decodes UTF-8 text,
//! - [`json_value`] parses a [`serde_json::Value`],
//! - [`json`] parses and binds to any [`DeserializeOwned`] type,
//! - [`none`] discards the body,
//! - [`pipe`] streams the body into a [`Sink`](futures_util::Sink), honoring
//!   its backpressure.
//!
//! Every codec yields `None` for an empty body.

use std::fmt;
use std::marker::PhantomData;

use bytes::{Bytes, BytesMut};
use futures_core::future::BoxFuture;
use http::HeaderMap;
use http_body_util::BodyExt as _;
use serde::de::DeserializeOwned;

use crate::body::Body;
use crate::client::Error;

mod encode;
mod pipe;

pub use self::encode::{Form, Multipart, Part, Payload};
pub(crate) use self::encode::encode;
pub use self::pipe::{pipe, Pipe};

/// A response body being read by a codec.
///
/// Data frames are handed out as chunks, trailers are kept aside for the
/// response.
#[derive(Debug)]
pub struct ResponseBody {
    body: Body,
    trailers: HeaderMap,
}

impl ResponseBody {
    /// Wrap a body for decoding.
    pub fn new(body: Body) -> Self {
        Self {
            body,
            trailers: HeaderMap::new(),
        }
    }

    /// The next chunk of data, or `None` once the body is complete.
    ///
    /// The underlying body is only polled while this future is, so a codec
    /// which stops asking for chunks stops the transfer.
    pub async fn chunk(&mut self) -> Option<Result<Bytes, Error>> {
        loop {
            let frame = match self.body.frame().await? {
                Ok(frame) => frame,
                Err(error) => return Some(Err(Error::from_transport(error))),
            };

            match frame.into_data() {
                Ok(data) if data.is_empty() => continue,
                Ok(data) => return Some(Ok(data)),
                Err(frame) => {
                    if let Ok(trailers) = frame.into_trailers() {
                        self.trailers.extend(trailers);
                    }
                }
            }
        }
    }

    /// Read the whole body into memory.
    pub async fn collect(&mut self) -> Result<Bytes, Error> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.chunk().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Read and discard the whole body.
    pub async fn drain(&mut self) -> Result<(), Error> {
        while let Some(chunk) = self.chunk().await {
            chunk?;
        }
        Ok(())
    }

    /// Trailers received so far.
    pub fn trailers(&self) -> &HeaderMap {
        &self.trailers
    }

    pub(crate) fn into_trailers(self) -> HeaderMap {
        self.trailers
    }
}

impl From<Body> for ResponseBody {
    fn from(body: Body) -> Self {
        Self::new(body)
    }
}

/// Decodes a response body into a value.
///
/// A codec is used once per attempt. When an interceptor resends a call, the
/// same codec decodes the new response.
pub trait BodyCodec: Send {
    /// The decoded value.
    type Output: Send + 'static;

    /// Consume `body`, producing the decoded value, or `None` when there is
    /// no content.
    fn decode<'a>(
        &'a mut self,
        body: &'a mut ResponseBody,
    ) -> BoxFuture<'a, Result<Option<Self::Output>, Error>>;
}

/// Codec which keeps the body as bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct Buffer {
    _priv: (),
}

/// Keep the response body as bytes.
pub fn buffer() -> Buffer {
    Buffer::default()
}

impl BodyCodec for Buffer {
    type Output = Bytes;

    fn decode<'a>(
        &'a mut self,
        body: &'a mut ResponseBody,
    ) -> BoxFuture<'a, Result<Option<Bytes>, Error>> {
        Box::pin(async move {
            let bytes = body.collect().await?;
            Ok((!bytes.is_empty()).then_some(bytes))
        })
    }
}

/// Codec which decodes the body as UTF-8 text.
#[derive(Debug, Default, Clone, Copy)]
pub struct Text {
    _priv: (),
}

/// Decode the response body as UTF-8 text.
pub fn string() -> Text {
    Text::default()
}

impl BodyCodec for Text {
    type Output = String;

    fn decode<'a>(
        &'a mut self,
        body: &'a mut ResponseBody,
    ) -> BoxFuture<'a, Result<Option<String>, Error>> {
        Box::pin(async move {
            let bytes = body.collect().await?;
            if bytes.is_empty() {
                return Ok(None);
            }

            String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|error| Error::Decode(error.into()))
        })
    }
}

/// Codec which parses the body as JSON and binds it to `T`.
pub struct Json<T> {
    target: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for Json<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Json")
            .field("target", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> Clone for Json<T> {
    fn clone(&self) -> Self {
        json()
    }
}

/// Parse the response body as JSON, binding it to `T`.
pub fn json<T>() -> Json<T> {
    Json {
        target: PhantomData,
    }
}

/// Parse the response body as an untyped JSON document.
pub fn json_value() -> Json<serde_json::Value> {
    json()
}

impl<T> BodyCodec for Json<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Output = T;

    fn decode<'a>(
        &'a mut self,
        body: &'a mut ResponseBody,
    ) -> BoxFuture<'a, Result<Option<T>, Error>> {
        Box::pin(async move {
            let bytes = body.collect().await?;
            if bytes.is_empty() {
                return Ok(None);
            }

            serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|error| Error::Decode(error.into()))
        })
    }
}

/// Codec which discards the body.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard {
    _priv: (),
}

/// Read and discard the response body.
pub fn none() -> Discard {
    Discard::default()
}

impl BodyCodec for Discard {
    type Output = ();

    fn decode<'a>(
        &'a mut self,
        body: &'a mut ResponseBody,
    ) -> BoxFuture<'a, Result<Option<()>, Error>> {
        Box::pin(async move {
            body.drain().await?;
            Ok(None)
        })
    }
}
