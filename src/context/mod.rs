//! The per-call execution context and the interceptor chain.
//!
//! Each call owns one [`HttpContext`]. The context is driven through the
//! client's interceptors in registration order. After the last interceptor
//! the request is resolved, dispatched on the transport and its body decoded.
//! The result then unwinds through the response handlers that interceptors
//! installed, newest first, before it reaches the caller.
//!
//! An interceptor either lets the call continue with [`HttpContext::next`],
//! or short-circuits it with [`HttpContext::complete`]. A response handler
//! either forwards the result with [`Unwind::Forward`], or starts the chain
//! over with [`HttpContext::send`].
//!
//! ```
//! use hyperwire::{HttpContext, Step, Unwind};
//!
//! fn retry(ctx: &mut HttpContext) -> Step {
//!     if ctx.payload::<u32>("retries").is_none() {
//!         ctx.set_payload("retries", 3u32);
//!         ctx.on_response(|ctx, result| {
//!             let remaining = ctx.payload_mut::<u32>("retries").unwrap();
//!             if result.is_err() && *remaining > 0 {
//!                 *remaining -= 1;
//!                 return ctx.send();
//!             }
//!             Unwind::Forward(result)
//!         });
//!     }
//!     ctx.next()
//! }
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::future::BoxFuture;
use tower::ServiceExt as _;
use tracing::Instrument as _;

use crate::client::{ClientOptions, Error};
use crate::codec::{BodyCodec, ResponseBody};
use crate::request::HttpRequest;
use crate::response::HttpResponse;
use crate::transport::SharedTransport;

mod timeout;

use self::timeout::Timeout;

/// The result of a call, as seen by interceptors and response handlers.
pub type CallResult = Result<HttpResponse, Error>;

/// The decision an interceptor makes about a call.
#[derive(Debug)]
pub enum Step {
    /// Continue with the next interceptor, or dispatch the request after the
    /// last one.
    Next,

    /// Finish the call with this result without reaching later interceptors
    /// or the transport. The result still unwinds through every response
    /// handler installed so far.
    Complete(CallResult),
}

/// The decision a response handler makes about a result.
#[derive(Debug)]
pub enum Unwind {
    /// Hand the result, possibly replaced, to the previously installed
    /// handler and finally to the caller.
    Forward(CallResult),

    /// Abandon this result and restart the chain from its head with the
    /// context's current request.
    Resend,
}

type ResponseHandler = Box<dyn FnMut(&mut HttpContext, CallResult) -> Unwind + Send>;

type PayloadTable = HashMap<String, Box<dyn Any + Send + Sync>>;

/// Middleware which observes and rewrites calls.
///
/// Any `Fn(&mut HttpContext) -> Step` closure is an interceptor. Implement
/// the trait directly to wait on something before deciding.
pub trait Interceptor: Send + Sync + 'static {
    /// Inspect the call and decide how it proceeds.
    fn intercept<'a>(&'a self, ctx: &'a mut HttpContext) -> BoxFuture<'a, Step>;
}

impl<F> Interceptor for F
where
    F: Fn(&mut HttpContext) -> Step + Send + Sync + 'static,
{
    fn intercept<'a>(&'a self, ctx: &'a mut HttpContext) -> BoxFuture<'a, Step> {
        let step = (self)(ctx);
        Box::pin(std::future::ready(step))
    }
}

/// The mutable state of one in-flight call.
pub struct HttpContext {
    request: HttpRequest,
    handlers: Vec<ResponseHandler>,
    payload: Option<PayloadTable>,
    attempt: u32,
}

impl fmt::Debug for HttpContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpContext")
            .field("request", &self.request)
            .field("handlers", &self.handlers.len())
            .field(
                "payload",
                &self
                    .payload
                    .as_ref()
                    .map(|table| table.keys().collect::<Vec<_>>()),
            )
            .field("attempt", &self.attempt)
            .finish()
    }
}

impl HttpContext {
    pub(crate) fn new(request: HttpRequest) -> Self {
        Self {
            request,
            handlers: Vec::new(),
            payload: None,
            attempt: 0,
        }
    }

    /// The request as it will be dispatched.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// Mutable access to the request, for interceptors which rewrite it.
    pub fn request_mut(&mut self) -> &mut HttpRequest {
        &mut self.request
    }

    /// Replace the request. Takes effect for the rest of this pass and for
    /// every resend.
    pub fn set_request(&mut self, request: HttpRequest) {
        self.request = request;
    }

    /// The number of the current pass through the chain, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Continue with the next interceptor.
    pub fn next(&self) -> Step {
        Step::Next
    }

    /// Finish the call with `result`.
    pub fn complete(&self, result: CallResult) -> Step {
        Step::Complete(result)
    }

    /// Start the chain over from its head. Return this from a response
    /// handler.
    pub fn send(&self) -> Unwind {
        Unwind::Resend
    }

    /// Install a response handler.
    ///
    /// Handlers run in reverse installation order. They stay installed
    /// across resends.
    pub fn on_response<F>(&mut self, handler: F)
    where
        F: FnMut(&mut HttpContext, CallResult) -> Unwind + Send + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Look up a value in the payload table.
    ///
    /// Returns `None` when the key is absent or holds a different type.
    pub fn payload<T: Any>(&self, key: &str) -> Option<&T> {
        self.payload
            .as_ref()?
            .get(key)
            .and_then(|value| value.downcast_ref())
    }

    /// Mutable access to a value in the payload table.
    pub fn payload_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.payload
            .as_mut()?
            .get_mut(key)
            .and_then(|value| value.downcast_mut())
    }

    /// Store a value in the payload table, replacing any previous value.
    ///
    /// The table lives as long as the call, across resends.
    pub fn set_payload<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.payload
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), Box::new(value));
    }

    /// Remove a value from the payload table.
    pub fn remove_payload<T: Any>(&mut self, key: &str) -> Option<T> {
        let table = self.payload.as_mut()?;
        if !table.get(key).is_some_and(|value| value.is::<T>()) {
            return None;
        }

        table
            .remove(key)
            .and_then(|value| value.downcast().ok())
            .map(|value| *value)
    }

    /// Run the request phase of every interceptor, from the head of the
    /// chain. Returns the result of a short-circuit, if any.
    async fn run_interceptors(&mut self, chain: &[Arc<dyn Interceptor>]) -> Option<CallResult> {
        for (cursor, interceptor) in chain.iter().enumerate() {
            tracing::trace!(cursor, attempt = self.attempt, "running interceptor");
            match interceptor.intercept(self).await {
                Step::Next => {}
                Step::Complete(result) => {
                    tracing::debug!(cursor, "interceptor completed the call");
                    return Some(result);
                }
            }
        }
        None
    }

    /// Pass a result through the installed response handlers, newest first.
    ///
    /// Returns `None` when a handler asked for a resend.
    fn unwind(&mut self, result: CallResult) -> Option<CallResult> {
        let mut handlers = mem::take(&mut self.handlers);
        let mut outcome = Some(result);

        for handler in handlers.iter_mut().rev() {
            let Some(result) = outcome.take() else {
                break;
            };

            match handler(self, result) {
                Unwind::Forward(forwarded) => outcome = Some(forwarded),
                Unwind::Resend => break,
            }
        }

        // Handlers installed while unwinding go after the existing ones.
        handlers.append(&mut self.handlers);
        self.handlers = handlers;

        if outcome.is_none() {
            tracing::debug!(attempt = self.attempt, "resending request");
        }
        outcome
    }
}

/// Drive a call to completion.
pub(crate) async fn execute<C>(
    transport: SharedTransport,
    options: Arc<ClientOptions>,
    chain: Arc<[Arc<dyn Interceptor>]>,
    request: HttpRequest,
    mut codec: C,
) -> Result<HttpResponse<C::Output>, Error>
where
    C: BodyCodec + 'static,
{
    let mut ctx = HttpContext::new(request);

    let result = loop {
        ctx.attempt += 1;

        let result = match ctx.run_interceptors(&chain).await {
            Some(result) => result,
            None => dispatch(&mut ctx, &transport, &options, &mut codec).await,
        };

        if let Some(result) = ctx.unwind(result) {
            break result;
        }
    };

    deliver(result)
}

/// The terminal step: resolve, send and decode one attempt.
async fn dispatch<C>(
    ctx: &mut HttpContext,
    transport: &SharedTransport,
    options: &ClientOptions,
    codec: &mut C,
) -> CallResult
where
    C: BodyCodec,
{
    let request = ctx.request.to_http(options)?;
    let timeout = ctx.request.get_timeout().or(options.timeout);
    tracing::trace!(uri = %request.uri(), attempt = ctx.attempt, "dispatching request");

    Timeout::new(exchange(transport.clone(), request, codec), timeout).await
}

async fn exchange<C>(
    transport: SharedTransport,
    request: http::Request<crate::Body>,
    codec: &mut C,
) -> CallResult
where
    C: BodyCodec,
{
    let response = transport.oneshot(request).await?;
    let (parts, body) = response.into_parts();

    let mut body = ResponseBody::new(body);
    let decoded = codec.decode(&mut body).await?;

    Ok(HttpResponse::from_parts(parts, body.into_trailers(), decoded).erase())
}

fn deliver<T: Any + Send>(result: CallResult) -> Result<HttpResponse<T>, Error> {
    result?.downcast::<T>().map_err(|response| {
        tracing::warn!(
            status = %response.status(),
            expected = std::any::type_name::<T>(),
            "response body has an unexpected type"
        );
        Error::Decode(
            format!(
                "response body is not a {}",
                std::any::type_name::<T>()
            )
            .into(),
        )
    })
}

/// A future which resolves to the decoded response of a call.
///
/// Dropping it cancels the call.
#[must_use = "futures do nothing unless polled"]
pub struct ResponseFuture<T> {
    inner: BoxFuture<'static, Result<HttpResponse<T>, Error>>,
}

impl<T> ResponseFuture<T> {
    pub(crate) fn new<F>(future: F, span: tracing::Span) -> Self
    where
        F: Future<Output = Result<HttpResponse<T>, Error>> + Send + 'static,
    {
        Self {
            inner: Box::pin(future.instrument(span)),
        }
    }
}

impl<T> Future for ResponseFuture<T> {
    type Output = Result<HttpResponse<T>, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for ResponseFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseFuture").finish()
    }
}
