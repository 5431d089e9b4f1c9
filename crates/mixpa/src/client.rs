//! Client facade.

use std::future::Future;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use crate::config::{Config, MixpaBuilder};
use crate::dispatch::{Dispatcher, Method, PendingRequest};
use crate::error::Error;
use crate::state::StateStore;
use crate::types::{keys, Properties};

/// Analytics client.
///
/// `track` and `set_user` return immediately and send in the background;
/// their outcomes are observable only through the configured error
/// handler. `set_user_props` returns a future to await. Both background
/// methods must be called from within a Tokio runtime.
///
/// # Example
///
/// ```rust,no_run
/// use mixpa::{Mixpa, Properties};
///
/// #[tokio::main]
/// async fn main() -> Result<(), mixpa::Error> {
///     let client = Mixpa::builder("tk_xxx").build()?;
///
///     client.set_state(Properties::new().insert("$device_id", "device-1"));
///     client.track("signup", Properties::new().insert("plan", "pro"));
///
///     client.set_user(Some("user-1"));
///     client
///         .set_user_props(Properties::new().insert("$name", "Ada"))
///         .await?;
///     Ok(())
/// }
/// ```
pub struct Mixpa {
    config: Arc<Config>,
    state: StateStore,
    dispatcher: Dispatcher,
}

impl Mixpa {
    /// Create a new builder with the given API token.
    pub fn builder(token: impl Into<String>) -> MixpaBuilder {
        MixpaBuilder::new(token)
    }

    /// Get the client configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Track an event.
    ///
    /// The current super-properties are merged under the call's
    /// properties, which win on conflict; the token is appended last.
    #[track_caller]
    pub fn track(&self, event: impl Into<String>, props: impl Into<Properties>) {
        let event: String = event.into();
        let mut properties = self.state.snapshot();
        for (key, value) in props.into().into_map() {
            properties.insert(key, value);
        }
        properties.insert("token".into(), Value::String(self.config.token.clone()));

        let data = json!({
            "event": event,
            "properties": Value::Object(properties),
        });
        self.spawn(PendingRequest::new(Method::Track, data));
    }

    /// Merge properties into the super-properties sent with every event.
    ///
    /// A `null` value clears its key. The canonical `distinct_id` is
    /// recomputed on every call.
    pub fn set_state(&self, state: impl Into<Properties>) {
        self.state.set_state(state.into().into_map());
    }

    /// Identify the current user, or clear the identity with `None`.
    ///
    /// When a user id is set and a device id is already known, one
    /// `$identify` event is sent linking the two; with no device id
    /// there is nothing anonymous to merge and no event is sent.
    #[track_caller]
    pub fn set_user(&self, user_id: Option<&str>) {
        let user = user_id.filter(|id| !id.is_empty());
        self.state.set_state(
            Properties::new()
                .insert(keys::USER_ID, user.map_or(Value::Null, Value::from))
                .into_map(),
        );

        let (Some(user), Some(device)) = (user, self.state.device_id()) else {
            // Nothing anonymous to merge.
            return;
        };
        debug!(user, device = %device, "linking identity");
        let properties = Properties::new()
            .insert(keys::IDENTIFIED_ID, user)
            .insert(keys::ANON_ID, device)
            .insert("token", self.config.token.as_str());
        let data = json!({
            "event": "$identify",
            "properties": Value::from(properties),
        });
        self.spawn(PendingRequest::new(Method::SetUser, data));
    }

    /// Update the profile of the current user.
    ///
    /// Fails without dispatching anything when no user has been
    /// identified or when `props` contains a collector-owned key.
    #[track_caller]
    pub fn set_user_props(
        &self,
        props: impl Into<Properties>,
    ) -> impl Future<Output = Result<(), Error>> + Send + '_ {
        let pending = self.profile_request(props.into(), None);
        async move { self.dispatcher.enqueue(pending?).await }
    }

    /// Update the profile of an explicit user.
    #[track_caller]
    pub fn set_user_props_for(
        &self,
        user_id: impl Into<String>,
        props: impl Into<Properties>,
    ) -> impl Future<Output = Result<(), Error>> + Send + '_ {
        let pending = self.profile_request(props.into(), Some(user_id.into()));
        async move { self.dispatcher.enqueue(pending?).await }
    }

    #[track_caller]
    fn profile_request(
        &self,
        props: Properties,
        user_id: Option<String>,
    ) -> Result<PendingRequest, Error> {
        for key in [keys::BUCKET, keys::DISTINCT_ID] {
            if props.get(key).is_some() {
                return Err(Error::ReservedProperty(key.into()));
            }
        }
        let user = user_id
            .filter(|id| !id.is_empty())
            .or_else(|| self.state.user_id())
            .ok_or(Error::UnidentifiedUser)?;

        let data = json!({
            "$token": self.config.token.clone(),
            "$distinct_id": user,
            "$set": Value::from(props),
        });
        Ok(PendingRequest::new(Method::SetUserProps, data))
    }

    /// Fire-and-forget dispatch; failures reach the error handler only.
    fn spawn(&self, pending: PendingRequest) {
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            let _ = dispatcher.enqueue(pending).await;
        });
    }
}

impl MixpaBuilder {
    /// Build the client.
    pub fn build(self) -> Result<Mixpa, Error> {
        let config = Arc::new(self.build_config()?);
        Ok(Mixpa {
            state: StateStore::default(),
            dispatcher: Dispatcher::new(config.clone()),
            config,
        })
    }
}
