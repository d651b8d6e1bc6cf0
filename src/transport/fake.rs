//! In-process transport for tests and examples.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use super::{OutboundRequest, Response, Transport, TransportError};

enum Reply {
    Respond(Response),
    Fail(String),
}

/// A [`Transport`] that replays canned replies and records every request.
///
/// Queued replies are consumed in order; once the queue is empty the
/// fallback reply is repeated.
pub struct StaticTransport {
    queue: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl StaticTransport {
    /// Always answer with `response`.
    pub fn responding(response: Response) -> Self {
        Self::with_fallback(Reply::Respond(response))
    }

    /// Always fail with a transport error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_fallback(Reply::Fail(message.into()))
    }

    fn with_fallback(fallback: Reply) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response to return before the fallback.
    pub fn then_respond(self, response: Response) -> Self {
        self.queue.lock().push_back(Reply::Respond(response));
        self
    }

    /// Queue a failure to return before the fallback.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.queue.lock().push_back(Reply::Fail(message.into()));
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Transport for StaticTransport {
    async fn send(&self, request: OutboundRequest) -> Result<Response, TransportError> {
        self.requests.lock().push(request);

        let queued = self.queue.lock().pop_front();
        match queued.as_ref().unwrap_or(&self.fallback) {
            Reply::Respond(response) => Ok(response.clone()),
            Reply::Fail(message) => Err(TransportError::Other(message.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use std::collections::BTreeMap;

    fn request() -> OutboundRequest {
        OutboundRequest {
            method: Method::GET,
            url: "https://example.com/".to_string(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_queue_then_fallback() {
        let transport = StaticTransport::responding(Response::new(StatusCode::OK))
            .then_fail("connection reset")
            .then_respond(Response::new(StatusCode::ACCEPTED));

        tokio_test::assert_err!(transport.send(request()).await);
        assert_eq!(transport.send(request()).await.unwrap().status, StatusCode::ACCEPTED);
        assert_eq!(transport.send(request()).await.unwrap().status, StatusCode::OK);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failing() {
        let transport = StaticTransport::failing("down");
        let err = transport.send(request()).await.unwrap_err();
        assert_eq!(err.to_string(), "down");
        assert_eq!(transport.requests(), vec![request()]);
    }
}
