//! Client configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::dispatch::Method;
use crate::error::{self, BoxFuture, Disposition, Error, ErrorHandler, SendFailure};
use crate::queue::{self, ExecuteSend, QueueFn};
use crate::transport::{BeaconSender, CallbackSender, HttpSender, ReqwestSender, TransportEnv};

/// Default collector root.
pub const DEFAULT_BASE_URL: &str = "https://api.mixpanel.com/";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default status tag for failures that must not be retried.
pub const DEFAULT_NON_RETRYABLE_STATUS: u16 = 0;

/// How much diagnostic behavior the client exhibits.
///
/// Levels are cumulative; each includes the effects of the ones below
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum DebugLevel {
    /// No diagnostics.
    #[default]
    Off,
    /// Log outgoing requests.
    Requests,
    /// Also ask the collector for verbose errors and surface them.
    Verbose,
    /// Also skip the network entirely.
    DryRun,
}

impl DebugLevel {
    pub(crate) fn log_requests(self) -> bool {
        self >= DebugLevel::Requests
    }

    pub(crate) fn verbose(self) -> bool {
        self >= DebugLevel::Verbose
    }

    pub(crate) fn dry_run(self) -> bool {
        self == DebugLevel::DryRun
    }
}

/// Immutable per-instance client configuration.
pub struct Config {
    pub(crate) token: String,
    pub(crate) base_url: String,
    pub(crate) debug: DebugLevel,
    pub(crate) timeout: Duration,
    pub(crate) non_retryable_status: u16,
    pub(crate) error_handler: ErrorHandler,
    pub(crate) queue: QueueFn,
    pub(crate) transports: TransportEnv,
}

impl Config {
    /// Get the API token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Get the collector base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the debug level.
    pub fn debug(&self) -> DebugLevel {
        self.debug
    }

    /// Get the request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the status tag applied to non-retryable failures.
    pub fn non_retryable_status(&self) -> u16 {
        self.non_retryable_status
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &self.token)
            .field("base_url", &self.base_url)
            .field("debug", &self.debug)
            .field("timeout", &self.timeout)
            .field("non_retryable_status", &self.non_retryable_status)
            .finish_non_exhaustive()
    }
}

/// Builder for the [`Mixpa`](crate::Mixpa) client.
pub struct MixpaBuilder {
    token: String,
    base_url: Option<String>,
    debug: DebugLevel,
    timeout: Option<Duration>,
    non_retryable_status: u16,
    error_handler: Option<ErrorHandler>,
    queue: Option<QueueFn>,
    transports: TransportEnv,
}

impl MixpaBuilder {
    /// Create a new builder with the given API token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: None,
            debug: DebugLevel::Off,
            timeout: None,
            non_retryable_status: DEFAULT_NON_RETRYABLE_STATUS,
            error_handler: None,
            queue: None,
            transports: TransportEnv::empty(),
        }
    }

    /// Set the collector base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the debug level.
    pub fn debug(mut self, level: DebugLevel) -> Self {
        self.debug = level;
        self
    }

    /// Set the request timeout for the default transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the status tag applied to non-retryable failures.
    pub fn non_retryable_status(mut self, status: u16) -> Self {
        self.non_retryable_status = status;
        self
    }

    /// Set the handler offered every dispatch failure.
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&SendFailure) -> Disposition + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Set the queue gate wrapping every dispatch.
    pub fn queue<F>(mut self, queue: F) -> Self
    where
        F: Fn(ExecuteSend, Method, Value) -> BoxFuture<Result<(), Error>>
            + Send
            + Sync
            + 'static,
    {
        self.queue = Some(Arc::new(queue));
        self
    }

    /// Register a fire-and-forget beacon primitive.
    pub fn beacon(mut self, sender: impl BeaconSender + 'static) -> Self {
        self.transports.beacon = Some(Arc::new(sender));
        self
    }

    /// Register a promise-style request primitive in place of the
    /// reqwest default.
    pub fn http(mut self, sender: impl HttpSender + 'static) -> Self {
        self.transports.http = Some(Arc::new(sender));
        self
    }

    /// Register a callback-style request primitive.
    pub fn callback(mut self, sender: impl CallbackSender + 'static) -> Self {
        self.transports.callback = Some(Arc::new(sender));
        self
    }

    /// Build the configuration.
    pub(crate) fn build_config(self) -> Result<Config, Error> {
        if self.token.is_empty() {
            return Err(Error::Config("token cannot be empty".into()));
        }

        let mut base_url = self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);

        // With no explicit primitives, the native environment supplies
        // the promise-style transport.
        let transports = if self.transports.is_empty() {
            TransportEnv {
                http: Some(Arc::new(ReqwestSender::new(timeout)?)),
                ..TransportEnv::empty()
            }
        } else {
            self.transports
        };

        Ok(Config {
            token: self.token,
            base_url,
            debug: self.debug,
            timeout,
            non_retryable_status: self.non_retryable_status,
            error_handler: self.error_handler.unwrap_or_else(error::default_handler),
            queue: self.queue.unwrap_or_else(queue::immediate),
            transports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = MixpaBuilder::new("tk_test").build_config().unwrap();

        assert_eq!(config.token(), "tk_test");
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.debug(), DebugLevel::Off);
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.non_retryable_status(), DEFAULT_NON_RETRYABLE_STATUS);
        assert!(config.transports.http.is_some());
        assert!(config.transports.beacon.is_none());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = MixpaBuilder::new("tk_test")
            .base_url("https://collector.example.com/")
            .debug(DebugLevel::Verbose)
            .timeout(Duration::from_secs(30))
            .non_retryable_status(600)
            .build_config()
            .unwrap();

        assert_eq!(config.base_url(), "https://collector.example.com/");
        assert_eq!(config.debug(), DebugLevel::Verbose);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.non_retryable_status(), 600);
    }

    #[test]
    fn test_builder_normalizes_base_url_slash() {
        let config = MixpaBuilder::new("tk_test")
            .base_url("https://collector.example.com")
            .build_config()
            .unwrap();

        assert_eq!(config.base_url(), "https://collector.example.com/");
    }

    #[test]
    fn test_builder_empty_token_fails() {
        assert!(MixpaBuilder::new("").build_config().is_err());
    }

    #[test]
    fn test_debug_levels_are_cumulative() {
        assert!(!DebugLevel::Off.log_requests());
        assert!(DebugLevel::Requests.log_requests());
        assert!(!DebugLevel::Requests.verbose());
        assert!(DebugLevel::Verbose.log_requests());
        assert!(DebugLevel::Verbose.verbose());
        assert!(!DebugLevel::Verbose.dry_run());
        assert!(DebugLevel::DryRun.log_requests());
        assert!(DebugLevel::DryRun.verbose());
        assert!(DebugLevel::DryRun.dry_run());
    }
}
