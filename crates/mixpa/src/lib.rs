//! Mixpanel-flavored analytics client.
//!
//! Maintains super-properties and the current user identity locally and
//! turns `track` / `set_user` / `set_user_props` calls into outbound
//! requests against a collector endpoint. Transport selection honors
//! page visibility (a hidden page sends through a fire-and-forget
//! beacon), a pluggable queue gate decides if and when each send runs,
//! and every failure is offered to a configurable error handler carrying
//! a retry closure.
//!
//! # Example
//!
//! ```rust,no_run
//! use mixpa::{Mixpa, Properties};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mixpa::Error> {
//!     let client = Mixpa::builder("tk_xxx").build()?;
//!
//!     client.set_state(Properties::new().insert("$device_id", "device-1"));
//!     client.track("signup", Properties::new().insert("plan", "pro"));
//!
//!     client.set_user(Some("user-1"));
//!     client
//!         .set_user_props(Properties::new().insert("$name", "Ada"))
//!         .await?;
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod dispatch;
mod encode;
mod error;
mod queue;
mod state;
mod transport;
mod types;
pub mod visibility;

pub use client::Mixpa;
pub use config::{
    Config, DebugLevel, MixpaBuilder, DEFAULT_BASE_URL, DEFAULT_NON_RETRYABLE_STATUS,
    DEFAULT_TIMEOUT,
};
pub use dispatch::Method;
pub use encode::encode_form;
pub use error::{BoxFuture, Disposition, Error, ErrorHandler, RetryFn, SendFailure};
pub use queue::{ExecuteSend, QueueFn};
pub use transport::{
    BeaconSender, CallbackSender, HttpSender, OutboundRequest, ReqwestSender, TransportEnv,
    TransportError, TransportReply,
};
pub use types::{keys, Properties, VerboseReply};
