//! The queue gate wrapping every dispatch.

use std::sync::Arc;

use serde_json::Value;
use tracing::error;

use crate::dispatch::Method;
use crate::error::{BoxFuture, Error};

/// The deferred send handed to a queue gate.
///
/// Invoking it runs the dispatch: encoding, transport, classification,
/// and the error-handler offering. Dropping it without invoking leaves
/// the originating call pending forever; a gate that withholds sends
/// owns that contract.
pub type ExecuteSend = Box<dyn FnOnce() -> BoxFuture<Result<(), Error>> + Send>;

/// Caller-supplied gate invoked once per dispatch in place of sending
/// immediately.
///
/// The gate decides if and when `ExecuteSend` runs: delay it until
/// connectivity returns, deduplicate, drop sends under a policy, or just
/// execute. It receives the method and the data mapping for its own
/// bookkeeping; mutating them is not possible, the dispatch already owns
/// its copy.
pub type QueueFn = Arc<dyn Fn(ExecuteSend, Method, Value) -> BoxFuture<Result<(), Error>> + Send + Sync>;

/// Default gate: execute immediately, log and swallow whatever the send
/// produced.
pub(crate) fn immediate() -> QueueFn {
    Arc::new(|send, method, data| {
        Box::pin(async move {
            if let Err(err) = send().await {
                error!(method = method.as_str(), %data, error = %err, "send failed");
            }
            Ok(())
        })
    })
}
