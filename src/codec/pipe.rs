//! Streaming a response body into a sink.

use std::future::poll_fn;

use bytes::Bytes;
use futures_core::future::BoxFuture;
use futures_util::{Sink, SinkExt as _};

use super::{BodyCodec, ResponseBody};
use crate::client::Error;
use crate::BoxError;

/// Codec which forwards the response body into a [`Sink`].
///
/// The next chunk is only read from the response once the sink reports it
/// is ready for it, so a slow sink pauses the transfer instead of buffering
/// without bound. When the response completes the sink is closed. A failure
/// of either the response stream or the sink fails the call, and the sink is
/// not closed in that case.
///
/// A call decodes every attempt with the same pipe. The sink is closed once
/// the first attempt's body has been written, so if a response handler then
/// resends the call the next attempt fails with [`Error::Sink`], and the
/// sink holds the first attempt's body.
///
/// The decoded body is always `None`.
#[derive(Debug)]
pub struct Pipe<S> {
    sink: S,
}

/// Stream the response body into `sink`.
pub fn pipe<S>(sink: S) -> Pipe<S>
where
    S: Sink<Bytes> + Unpin + Send,
    S::Error: Into<BoxError>,
{
    Pipe { sink }
}

impl<S> Pipe<S> {
    /// Recover the sink.
    pub fn into_inner(self) -> S {
        self.sink
    }
}

fn sink_error<E: Into<BoxError>>(error: E) -> Error {
    Error::Sink(error.into())
}

impl<S> BodyCodec for Pipe<S>
where
    S: Sink<Bytes> + Unpin + Send,
    S::Error: Into<BoxError>,
{
    type Output = ();

    fn decode<'a>(
        &'a mut self,
        body: &'a mut ResponseBody,
    ) -> BoxFuture<'a, Result<Option<()>, Error>> {
        Box::pin(async move {
            let mut written = 0usize;
            loop {
                poll_fn(|cx| self.sink.poll_ready_unpin(cx))
                    .await
                    .map_err(sink_error)?;

                match body.chunk().await {
                    Some(chunk) => {
                        let chunk = chunk?;
                        written += chunk.len();
                        self.sink.start_send_unpin(chunk).map_err(sink_error)?;
                    }
                    None => break,
                }
            }

            self.sink.close().await.map_err(sink_error)?;
            tracing::trace!(bytes = written, "response body piped to sink");
            Ok(None)
        })
    }
}
