//! Hyperwire
//!
//! An interceptor-driven request pipeline for HTTP clients, built on [hyper].
//!
//! A [`Client`] hands out [`HttpRequest`] descriptors. Sending one creates an
//! [`HttpContext`] which is driven through the client's [`Interceptor`]s,
//! dispatched on a transport, decoded by a [codec] and unwound through the
//! response handlers the interceptors installed.
//!
//! ```no_run
//! use hyperwire::{Client, HttpContext, Step};
//!
//! # async fn run() -> Result<(), hyperwire::Error> {
//! let client = Client::build_tcp_http()
//!     .with_default_host("example.com")
//!     .with_interceptor(|ctx: &mut HttpContext| {
//!         ctx.request_mut().put_header("x-request-source", "hyperwire");
//!         ctx.next()
//!     })
//!     .build();
//!
//! let response = client
//!     .get("/items")
//!     .send_with(hyperwire::codec::json_value())?
//!     .await?;
//! println!("{:?}", response.body());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod body;
pub use body::Body;
pub mod client;
pub use client::{Client, Error};
pub mod codec;
pub mod context;
pub use context::{CallResult, HttpContext, Interceptor, ResponseFuture, Step, Unwind};
pub mod request;
pub use request::{HttpRequest, QueryParams};
pub mod response;
pub use response::HttpResponse;
pub mod transport;

/// A type-erased error, used wherever the cause of a failure is opaque.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
