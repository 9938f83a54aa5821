//! HTTP delivery shared by both shippers.
//!
//! Shippers only build payloads; the POST itself goes through the
//! [`Transport`] trait so tests can observe exactly which requests would
//! have hit the network.

use std::sync::{PoisonError, RwLock};

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use super::error::ShipError;

/// A fully encoded request ready to be POSTed.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub endpoint: String,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: Vec<u8>,
}

/// Status and body of a backend response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, request: OutboundRequest) -> Result<TransportResponse, ShipError>;

    /// Releases pooled connections. Later `post` calls fail with `ShipError::Closed`.
    fn close(&self);
}

/// `reqwest`-backed transport. The client, and with it the connection pool,
/// is built once and reused for every request until [`Transport::close`].
pub struct HttpTransport {
    client: RwLock<Option<Client>>,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client: RwLock::new(Some(client)),
        }
    }

    fn client(&self) -> Option<Client> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: OutboundRequest) -> Result<TransportResponse, ShipError> {
        let client = self.client().ok_or(ShipError::Closed)?;

        let mut builder = client.post(&request.endpoint);
        for (name, value) in &request.headers {
            builder = builder.header(*name, *value);
        }

        let to_request_error = |source| ShipError::Request {
            endpoint: request.endpoint.clone(),
            source,
        };

        let response = builder
            .body(request.body)
            .send()
            .await
            .map_err(to_request_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(to_request_error)?;

        Ok(TransportResponse { status, body })
    }

    fn close(&self) {
        // Dropping the last handle to the client tears down its idle connections.
        self.client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// POSTs `request`, racing it against `ctx`, and maps non-2xx answers to
/// [`ShipError::UnexpectedStatus`].
pub async fn deliver(
    transport: &dyn Transport,
    ctx: &CancellationToken,
    request: OutboundRequest,
) -> Result<TransportResponse, ShipError> {
    let response = tokio::select! {
        biased;
        _ = ctx.cancelled() => return Err(ShipError::Cancelled),
        response = transport.post(request) => response?,
    };

    if !response.is_success() {
        return Err(ShipError::UnexpectedStatus {
            status: response.status,
            body: response.body,
        });
    }

    Ok(response)
}

#[cfg(test)]
pub(crate) mod mock {
    use std::{
        collections::VecDeque,
        sync::{
            Mutex,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    };

    use super::*;

    /// Records every request and answers from a scripted queue (200 "ok" when empty).
    #[derive(Default)]
    pub struct MockTransport {
        requests: Mutex<Vec<OutboundRequest>>,
        responses: Mutex<VecDeque<TransportResponse>>,
        delay: Option<Duration>,
        closed: AtomicBool,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        pub fn respond(&self, status: u16, body: &str) {
            self.responses.lock().unwrap().push_back(TransportResponse {
                status,
                body: body.to_string(),
            });
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn last_request(&self) -> Option<OutboundRequest> {
            self.requests.lock().unwrap().last().cloned()
        }

        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Transport for MockTransport {
        async fn post(&self, request: OutboundRequest) -> Result<TransportResponse, ShipError> {
            if self.is_closed() {
                return Err(ShipError::Closed);
            }
            self.requests.lock().unwrap().push(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(TransportResponse {
                    status: 200,
                    body: "ok".to_string(),
                }))
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }
}
