//! Bounding a single attempt by a deadline.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use pin_project::pin_project;

use crate::client::Error;

/// Races an attempt against an optional deadline.
///
/// When the deadline fires first the attempt resolves to
/// [`Error::Timeout`]. The inner future is dropped along with this one, which
/// cancels whatever exchange it was driving.
#[derive(Debug)]
#[pin_project]
pub(crate) struct Timeout<F> {
    #[pin]
    inner: F,

    #[pin]
    sleep: Option<tokio::time::Sleep>,
}

impl<F> Timeout<F> {
    pub(crate) fn new(inner: F, timeout: Option<Duration>) -> Self {
        Self {
            inner,
            sleep: timeout.map(tokio::time::sleep),
        }
    }
}

impl<F, R> Future for Timeout<F>
where
    F: Future<Output = Result<R, Error>>,
{
    type Output = Result<R, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if let Poll::Ready(output) = this.inner.poll(cx) {
            return Poll::Ready(output);
        }

        match this.sleep.as_pin_mut().map(|sleep| sleep.poll(cx)) {
            Some(Poll::Ready(())) => {
                tracing::debug!("attempt timed out");
                Poll::Ready(Err(Error::Timeout))
            }
            _ => Poll::Pending,
        }
    }
}
