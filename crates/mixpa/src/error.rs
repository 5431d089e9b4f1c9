//! Error types and the failure-handling contract.

use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::error;

use crate::dispatch::Method;

/// Boxed future used at the queue-gate and retry seams.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Closure that re-runs a failed dispatch with the same method and data.
pub type RetryFn = Arc<dyn Fn() -> BoxFuture<Result<(), Error>> + Send + Sync>;

/// What an error handler decided about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The failure is dealt with; the original call resolves.
    Handled,
    /// The caller must still see the failure. Honored only for
    /// [`Method::SetUserProps`]; other methods are fire-and-forget and
    /// log the escalation instead.
    Escalate,
}

/// Handler offered every dispatch failure before anything else sees it.
pub type ErrorHandler = Arc<dyn Fn(&SendFailure) -> Disposition + Send + Sync>;

/// Default handler: log the failure and treat it as dealt with.
pub(crate) fn default_handler() -> ErrorHandler {
    Arc::new(|failure| {
        error!(
            method = failure.method().as_str(),
            status = ?failure.status(),
            data = %failure.data(),
            call_site = %failure.call_site(),
            error = %failure,
            "analytics send failed"
        );
        Disposition::Handled
    })
}

/// A failed dispatch attempt.
///
/// Carries everything a handler needs to decide what to do: the message,
/// the HTTP status when one was obtained, the method and data that were
/// being sent, the call site that initiated them, and a [`retry`]
/// closure.
///
/// [`retry`]: SendFailure::retry
#[derive(Clone, thiserror::Error)]
#[error("{message}")]
pub struct SendFailure {
    pub(crate) message: String,
    pub(crate) status: Option<u16>,
    pub(crate) retryable: bool,
    pub(crate) method: Method,
    pub(crate) data: Value,
    pub(crate) call_site: &'static Location<'static>,
    pub(crate) retry: RetryFn,
}

impl SendFailure {
    /// Human-readable description of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status, when a response was obtained. Business-rule failures
    /// carry the configured non-retryable sentinel instead.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Whether retrying could plausibly succeed. False for failures the
    /// collector rejected at the application level.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// The method whose dispatch failed.
    pub fn method(&self) -> Method {
        self.method
    }

    /// The data mapping that was being sent.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Source location of the originating facade call.
    pub fn call_site(&self) -> &'static Location<'static> {
        self.call_site
    }

    /// Re-dispatches the same method and data.
    ///
    /// This is a brand-new dispatch, not a continuation: it is encoded,
    /// debug-gated, sent, classified, and offered to the error handler
    /// again.
    pub fn retry(&self) -> BoxFuture<Result<(), Error>> {
        (self.retry)()
    }
}

impl fmt::Debug for SendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendFailure")
            .field("message", &self.message)
            .field("status", &self.status)
            .field("retryable", &self.retryable)
            .field("method", &self.method)
            .field("data", &self.data)
            .field("call_site", &format_args!("{}", self.call_site))
            .finish_non_exhaustive()
    }
}

/// Errors surfaced by the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A profile update was attempted with no user identified.
    #[error("no user has been identified")]
    UnidentifiedUser,

    /// A profile update tried to set a property owned by the collector.
    #[error("reserved profile property: {0}")]
    ReservedProperty(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A dispatch failed and the error handler escalated it.
    #[error(transparent)]
    Dispatch(#[from] SendFailure),
}
