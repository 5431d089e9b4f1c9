//! Request construction, transport invocation, and outcome
//! classification.

use std::fmt;
use std::panic::Location;
use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::encode::encode_form;
use crate::error::{Disposition, Error, RetryFn, SendFailure};
use crate::queue::ExecuteSend;
use crate::transport::{self, OutboundRequest};
use crate::visibility;

/// Outbound call kinds and their wire paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Record an event.
    Track,
    /// Link a user identity to an anonymous device.
    SetUser,
    /// Update a user profile.
    SetUserProps,
}

impl Method {
    /// Path appended to the base URL.
    ///
    /// The fragment names the collector operation for humans reading
    /// logs; it never reaches the wire.
    pub fn path(self) -> &'static str {
        match self {
            Method::Track => "track#live-event",
            Method::SetUser => "track#create-identity",
            Method::SetUserProps => "engage#profile-set",
        }
    }

    /// Method name as reported to error handlers and queue gates.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Track => "track",
            Method::SetUser => "setUser",
            Method::SetUserProps => "setUserProps",
        }
    }

    /// Whether a handler escalation reaches this method's caller. Only
    /// profile updates are awaited; everything else is fire-and-forget.
    pub(crate) fn is_critical(self) -> bool {
        matches!(self, Method::SetUserProps)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound call, captured at the facade call site.
#[derive(Debug, Clone)]
pub(crate) struct PendingRequest {
    pub method: Method,
    pub data: Value,
    pub call_site: &'static Location<'static>,
}

impl PendingRequest {
    #[track_caller]
    pub fn new(method: Method, data: Value) -> Self {
        Self {
            method,
            data,
            call_site: Location::caller(),
        }
    }
}

/// Builds, gates, sends, and classifies outbound requests.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    config: Arc<Config>,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Runs one gated dispatch to completion.
    ///
    /// `Err` only when the error handler escalated a failure of a
    /// critical method; that travels on a dedicated slot so a gate that
    /// swallows the send result cannot mask it.
    pub async fn enqueue(&self, pending: PendingRequest) -> Result<(), Error> {
        let method = pending.method;
        let data = pending.data.clone();

        let must_fail: Arc<Mutex<Option<SendFailure>>> = Arc::new(Mutex::new(None));
        let slot = must_fail.clone();
        let dispatcher = self.clone();
        let execute: ExecuteSend = Box::new(move || {
            Box::pin(async move {
                match dispatcher.dispatch(pending).await {
                    Ok(()) => Ok(()),
                    Err(failure) => {
                        *slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) =
                            Some(failure.clone());
                        Err(Error::Dispatch(failure))
                    }
                }
            })
        });

        let gated = (self.config.queue)(execute, method, data).await;
        let escalated = must_fail
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match escalated {
            Some(failure) => Err(Error::Dispatch(failure)),
            None => gated,
        }
    }

    /// Sends once and applies the error-handler policy.
    ///
    /// `Err` means the caller must still fail: the handler escalated and
    /// the method is critical.
    async fn dispatch(&self, pending: PendingRequest) -> Result<(), SendFailure> {
        match self.send_once(&pending).await {
            Ok(()) => Ok(()),
            Err(failure) => self.apply_handler(failure),
        }
    }

    fn apply_handler(&self, failure: SendFailure) -> Result<(), SendFailure> {
        match (self.config.error_handler)(&failure) {
            Disposition::Handled => Ok(()),
            Disposition::Escalate if failure.method().is_critical() => Err(failure),
            Disposition::Escalate => {
                warn!(
                    method = failure.method().as_str(),
                    error = %failure,
                    "escalation ignored for fire-and-forget method"
                );
                Ok(())
            }
        }
    }

    /// One transport attempt: build the envelope, pick a mechanism, send,
    /// classify.
    async fn send_once(&self, pending: &PendingRequest) -> Result<(), SendFailure> {
        let config = &self.config;
        let url = format!("{}{}", config.base_url, pending.method.path());
        let verbose = config.debug.verbose();

        let mut envelope = Map::new();
        envelope.insert("data".into(), pending.data.clone());
        if verbose {
            envelope.insert("verbose".into(), json!(1));
        }

        if config.debug.log_requests() {
            info!(method = %pending.method, data = %pending.data, "dispatching");
        }
        if config.debug.dry_run() {
            debug!(method = %pending.method, "dry run, skipping send");
            return Ok(());
        }

        let payload = encode_form(&envelope);
        let Some(transport) = transport::select(&config.transports, visibility::page_hidden())
        else {
            return Err(self.failure(pending, "no transport available".into(), None, false));
        };
        debug!(transport = transport.name(), %url, "sending");

        let request = OutboundRequest {
            url,
            payload,
            parse_reply: verbose,
        };
        match transport.invoke(request).await {
            // Beacon path: accepted for delivery is all we ever learn.
            Ok(None) => Ok(()),
            Ok(Some(reply)) => {
                if !reply.is_success() {
                    return Err(self.failure(
                        pending,
                        format!("collector returned HTTP {}", reply.status),
                        Some(reply.status),
                        true,
                    ));
                }
                if verbose {
                    if let Some(error) = reply.body.and_then(|body| body.error) {
                        return Err(self.failure(
                            pending,
                            error,
                            Some(config.non_retryable_status),
                            false,
                        ));
                    }
                }
                Ok(())
            }
            Err(err) => Err(self.failure(pending, err.to_string(), None, true)),
        }
    }

    fn failure(
        &self,
        pending: &PendingRequest,
        message: String,
        status: Option<u16>,
        retryable: bool,
    ) -> SendFailure {
        let dispatcher = self.clone();
        let again = pending.clone();
        let retry: RetryFn = Arc::new(move || {
            let dispatcher = dispatcher.clone();
            let pending = again.clone();
            Box::pin(async move { dispatcher.dispatch(pending).await.map_err(Error::Dispatch) })
        });

        SendFailure {
            message,
            status,
            retryable,
            method: pending.method,
            data: pending.data.clone(),
            call_site: pending.call_site,
            retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_path_table() {
        assert_eq!(Method::Track.path(), "track#live-event");
        assert_eq!(Method::SetUser.path(), "track#create-identity");
        assert_eq!(Method::SetUserProps.path(), "engage#profile-set");
    }

    #[test]
    fn test_only_profile_updates_are_critical() {
        assert!(Method::SetUserProps.is_critical());
        assert!(!Method::Track.is_critical());
        assert!(!Method::SetUser.is_critical());
    }

    #[test]
    fn test_method_names() {
        assert_eq!(Method::Track.as_str(), "track");
        assert_eq!(Method::SetUser.as_str(), "setUser");
        assert_eq!(Method::SetUserProps.as_str(), "setUserProps");
    }

    #[test]
    fn test_pending_request_records_call_site() {
        let pending = PendingRequest::new(Method::Track, json!({"event": "e"}));
        assert!(pending.call_site.file().ends_with("dispatch.rs"));
    }
}
