//! Send mechanisms and per-request transport selection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::debug;

use crate::types::VerboseReply;
use crate::Error;

/// One outbound collector request, ready for any transport.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// Full request URL.
    pub url: String,
    /// Form-urlencoded body.
    pub payload: String,
    /// Ask the transport to parse the response body. Set when verbose
    /// errors were requested (debug level 2 and up).
    pub parse_reply: bool,
}

/// Transport-level view of an HTTP response.
#[derive(Debug, Clone, Default)]
pub struct TransportReply {
    /// HTTP status code.
    pub status: u16,
    /// Parsed body, present only when requested and parseable.
    pub body: Option<VerboseReply>,
}

impl TransportReply {
    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The transport could not obtain any HTTP response.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Fire-and-forget send primitive.
///
/// `true` means the payload was accepted for delivery, not that the
/// server processed it. There is no observable response.
pub trait BeaconSender: Send + Sync {
    /// Hands the payload to the host for background delivery.
    fn send(&self, url: &str, payload: &str) -> bool;
}

/// Promise-style request primitive.
#[async_trait]
pub trait HttpSender: Send + Sync {
    /// POSTs the request with a form-urlencoded content type.
    async fn send(&self, request: OutboundRequest) -> Result<TransportReply, TransportError>;
}

/// Callback-style request object.
///
/// `done` must be invoked exactly once with the outcome. The rest of the
/// system only ever sees this through the async adaption in
/// [`Transport::invoke`]; the callback style stops here.
pub trait CallbackSender: Send + Sync {
    /// Starts the request and reports its outcome through `done`.
    fn send(
        &self,
        request: OutboundRequest,
        done: Box<dyn FnOnce(Result<TransportReply, TransportError>) + Send>,
    );
}

/// Which send primitives the host environment supplies.
///
/// The default environment registers only the reqwest-backed
/// [`HttpSender`]; browser-like hosts add a beacon and install a
/// visibility source alongside it.
#[derive(Clone, Default)]
pub struct TransportEnv {
    pub(crate) beacon: Option<Arc<dyn BeaconSender>>,
    pub(crate) http: Option<Arc<dyn HttpSender>>,
    pub(crate) callback: Option<Arc<dyn CallbackSender>>,
}

impl TransportEnv {
    /// Environment with no primitives registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when no primitive has been registered.
    pub(crate) fn is_empty(&self) -> bool {
        self.beacon.is_none() && self.http.is_none() && self.callback.is_none()
    }
}

/// Closed set of send mechanisms a dispatch can use.
#[derive(Clone)]
pub(crate) enum Transport {
    Beacon(Arc<dyn BeaconSender>),
    Http(Arc<dyn HttpSender>),
    Callback(Arc<dyn CallbackSender>),
}

impl Transport {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Transport::Beacon(_) => "beacon",
            Transport::Http(_) => "http",
            Transport::Callback(_) => "callback",
        }
    }

    /// Runs the request on this mechanism.
    ///
    /// `Ok(None)` means the beacon accepted the payload; there is nothing
    /// further to observe on that path.
    pub(crate) async fn invoke(
        &self,
        request: OutboundRequest,
    ) -> Result<Option<TransportReply>, TransportError> {
        match self {
            Transport::Beacon(beacon) => {
                if beacon.send(&request.url, &request.payload) {
                    Ok(None)
                } else {
                    Err(TransportError(format!(
                        "beacon rejected payload for {}",
                        request.url
                    )))
                }
            }
            Transport::Http(http) => http.send(request).await.map(Some),
            Transport::Callback(callback) => {
                let (tx, rx) = oneshot::channel();
                callback.send(
                    request,
                    Box::new(move |outcome| {
                        let _ = tx.send(outcome);
                    }),
                );
                match rx.await {
                    Ok(outcome) => outcome.map(Some),
                    Err(_) => Err(TransportError(
                        "request dropped without completing".into(),
                    )),
                }
            }
        }
    }
}

/// Picks the mechanism for the next request.
///
/// A hidden page selects the beacon: anything else risks being aborted
/// mid-flight while the page unloads. Otherwise the promise-style
/// primitive is preferred over the callback-style one. A hidden page
/// without a registered beacon falls through to the request transports.
pub(crate) fn select(env: &TransportEnv, hidden: bool) -> Option<Transport> {
    if hidden {
        if let Some(beacon) = &env.beacon {
            return Some(Transport::Beacon(beacon.clone()));
        }
    }
    if let Some(http) = &env.http {
        return Some(Transport::Http(http.clone()));
    }
    env.callback
        .as_ref()
        .map(|callback| Transport::Callback(callback.clone()))
}

/// Default [`HttpSender`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestSender {
    client: reqwest::Client,
}

impl ReqwestSender {
    /// Creates a sender with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpSender for ReqwestSender {
    async fn send(&self, request: OutboundRequest) -> Result<TransportReply, TransportError> {
        let OutboundRequest {
            url,
            payload,
            parse_reply,
        } = request;

        debug!(%url, "posting payload");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(payload)
            .send()
            .await
            .map_err(|err| TransportError(format!("network request failed: {err}")))?;

        let status = response.status().as_u16();
        let body = if parse_reply {
            response.json::<VerboseReply>().await.ok()
        } else {
            None
        };

        Ok(TransportReply { status, body })
    }
}
