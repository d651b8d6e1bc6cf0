//! withlimits - HTTP requests that respect advertised rate limits
//!
//! This crate sends HTTP requests through a [`RequestDispatcher`] guarded by
//! rate limit gates. Each gate reads the limit a server advertises in its
//! response headers and, once the limit is reached, refuses further calls to
//! that endpoint until the advertised window has passed.

pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ratelimit;
pub mod transport;

pub use cache::{GateCache, MemoryCache};
pub use dispatcher::{Dispatch, MalformedHeaderPolicy, RateLimitExceeded, RequestDispatcher};
pub use error::{Result, WithLimitsError};
pub use ratelimit::{GateKey, LimitHeaders, LimitSnapshot, RateLimit};
pub use transport::{OutboundRequest, ReqwestTransport, Response, StaticTransport, Transport};
