//! Super-properties and identity state.

use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::types::keys;

/// Super-properties merged into every tracked event, plus the derived
/// `distinct_id`.
#[derive(Debug, Default)]
pub(crate) struct StateStore {
    props: Mutex<Map<String, Value>>,
}

impl StateStore {
    /// Shallow-merges `partial` into the current super-properties and
    /// recomputes `distinct_id`. A `null` value clears its key.
    pub fn set_state(&self, partial: Map<String, Value>) {
        let mut props = self.lock();
        for (key, value) in partial {
            match value {
                Value::Null => {
                    props.remove(&key);
                }
                value => {
                    props.insert(key, value);
                }
            }
        }
        Self::derive_distinct_id(&mut props);
    }

    /// Clone of the current super-properties.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.lock().clone()
    }

    /// Current user id, when one has been set.
    pub fn user_id(&self) -> Option<String> {
        non_empty(self.lock().get(keys::USER_ID)).map(str::to_owned)
    }

    /// Current device id, when one has been set.
    pub fn device_id(&self) -> Option<String> {
        non_empty(self.lock().get(keys::DEVICE_ID)).map(str::to_owned)
    }

    fn derive_distinct_id(props: &mut Map<String, Value>) {
        let id = non_empty(props.get(keys::USER_ID))
            .or_else(|| non_empty(props.get(keys::DEVICE_ID)))
            .map(str::to_owned);
        match id {
            Some(id) => {
                props.insert(keys::DISTINCT_ID.into(), Value::String(id));
            }
            None => {
                props.remove(keys::DISTINCT_ID);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Map<String, Value>> {
        self.props.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn non_empty(value: Option<&Value>) -> Option<&str> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}
