//! Rate limit header conventions and parsing.
//!
//! A remote server advertises its limit, the length of the window the limit
//! applies to, and how much of the limit has been used so far. Servers
//! disagree on how those three numbers are laid out, so the layout is part of
//! each gate's configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, WithLimitsError};
use crate::transport::Response;

/// Suffix of the header carrying the usage count in the combined convention.
pub const COUNT_SUFFIX: &str = "-Count";

/// Where the limit, window and count are found in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LimitHeaders {
    /// One header holding `[limit, window_seconds]` by position, plus a
    /// `<name>-Count` header holding the current usage.
    ///
    /// The values are the header's field lines in order, each split on `,`,
    /// so `X-Limit: 5, 60` and two separate `X-Limit` lines read the same.
    Combined(String),
    /// Three separate headers, each read at position 0.
    Split {
        limit: String,
        window: String,
        count: String,
    },
}

impl LimitHeaders {
    /// The combined convention rooted at `name`.
    pub fn combined(name: impl Into<String>) -> Self {
        LimitHeaders::Combined(name.into())
    }

    /// One header per value.
    pub fn split(
        limit: impl Into<String>,
        window: impl Into<String>,
        count: impl Into<String>,
    ) -> Self {
        LimitHeaders::Split {
            limit: limit.into(),
            window: window.into(),
            count: count.into(),
        }
    }

    /// Read a snapshot of the advertised limit from a response.
    ///
    /// Fails with [`WithLimitsError::MalformedRateLimitHeader`] when a header
    /// is absent, carries too few values, or a value is not a non-negative
    /// integer.
    pub fn parse(&self, response: &Response) -> Result<LimitSnapshot> {
        let (limit, window, count) = match self {
            LimitHeaders::Combined(name) => {
                let count_header = format!("{}{}", name, COUNT_SUFFIX);
                (
                    value_at(response, name, 0)?,
                    value_at(response, name, 1)?,
                    value_at(response, &count_header, 0)?,
                )
            }
            LimitHeaders::Split {
                limit,
                window,
                count,
            } => (
                value_at(response, limit, 0)?,
                value_at(response, window, 0)?,
                value_at(response, count, 0)?,
            ),
        };

        Ok(LimitSnapshot {
            limit,
            window: Duration::from_secs(window),
            count,
        })
    }
}

impl std::fmt::Display for LimitHeaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitHeaders::Combined(name) => write!(f, "{}", name),
            LimitHeaders::Split {
                limit,
                window,
                count,
            } => write!(f, "{}/{}/{}", limit, window, count),
        }
    }
}

/// The limit state a server reported in one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitSnapshot {
    /// Maximum number of calls allowed in the window
    pub limit: u64,
    /// Length of the window
    pub window: Duration,
    /// Calls already made in the current window
    pub count: u64,
}

impl LimitSnapshot {
    /// Whether the usage has reached the limit.
    pub fn is_exhausted(&self) -> bool {
        self.count >= self.limit
    }

    /// Calls left before the limit is reached.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.count)
    }
}

fn value_at(response: &Response, header: &str, index: usize) -> Result<u64> {
    let values = response.header_values(header);

    if values.is_empty() {
        return Err(WithLimitsError::malformed(header, "header missing"));
    }

    let raw = values.get(index).ok_or_else(|| {
        WithLimitsError::malformed(
            header,
            format!("expected at least {} values, found {}", index + 1, values.len()),
        )
    })?;

    raw.parse::<u64>().map_err(|_| {
        WithLimitsError::malformed(header, format!("expected an integer at {}, got '{}'", index, raw))
    })
}
