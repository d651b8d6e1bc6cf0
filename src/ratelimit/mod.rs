//! Rate limit gates and the header conventions they read.

mod gate;
mod headers;
mod key;

pub use gate::RateLimit;
pub use headers::{LimitHeaders, LimitSnapshot, COUNT_SUFFIX};
pub use key::GateKey;
