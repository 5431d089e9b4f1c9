//! Property mappings and collector wire types.

use serde_json::{Map, Value};

/// Reserved property keys.
///
/// Super-property keys are prefixed with `$` and recognized by the
/// collector; `distinct_id` and `bucket` are owned internally and must
/// not be set by callers.
pub mod keys {
    /// Application version super-property.
    pub const APP_VERSION: &str = "$app_version_string";
    /// Operating system version super-property.
    pub const OS_VERSION: &str = "$os_version";
    /// Device model name (eg: "iPad 3,4").
    pub const MODEL: &str = "$model";
    /// Device UUID generated and persisted by the caller.
    pub const DEVICE_ID: &str = "$device_id";
    /// Full URL of the page on which the event is triggered.
    pub const CURRENT_URL: &str = "$current_url";
    /// Current user identifier, managed through `Mixpa::set_user`.
    pub const USER_ID: &str = "$user_id";
    /// Canonical identity, derived from the user id or the device id.
    pub const DISTINCT_ID: &str = "distinct_id";
    /// Reserved for internal use by the collector.
    pub const BUCKET: &str = "bucket";
    /// Identity-link field carrying the newly identified user id.
    pub const IDENTIFIED_ID: &str = "$identified_id";
    /// Identity-link field carrying the previously anonymous device id.
    pub const ANON_ID: &str = "$anon_id";
}

/// A builder for event, super, or profile properties.
///
/// Keys keep their insertion order all the way to the wire.
///
/// # Example
///
/// ```
/// use mixpa::Properties;
///
/// let props = Properties::new()
///     .insert("button_name", "checkout")
///     .insert("page", "/cart")
///     .insert("price", 99.99);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Properties {
    inner: Map<String, Value>,
}

impl Properties {
    /// Creates an empty Properties builder.
    pub fn new() -> Self {
        Self { inner: Map::new() }
    }

    /// Inserts a key-value pair.
    ///
    /// The value can be any type that converts into `serde_json::Value`,
    /// including strings, numbers, arrays, and nested objects.
    pub fn insert<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.inner.insert(key.into(), value.into());
        self
    }

    /// Merges another Properties into this one.
    ///
    /// If both contain the same key, the value from `other` wins.
    pub fn merge(mut self, other: Properties) -> Self {
        for (k, v) in other.inner {
            self.inner.insert(k, v);
        }
        self
    }

    /// Returns true if there are no properties.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of properties.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Gets a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.get(key)
    }

    /// Consumes the builder and returns the underlying map.
    pub fn into_map(self) -> Map<String, Value> {
        self.inner
    }
}

impl From<Properties> for Value {
    fn from(props: Properties) -> Self {
        Value::Object(props.inner)
    }
}

impl From<Map<String, Value>> for Properties {
    fn from(map: Map<String, Value>) -> Self {
        Self { inner: map }
    }
}

impl From<Value> for Properties {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self { inner: map },
            _ => Self::new(),
        }
    }
}

/// Body returned by the collector when verbose errors are requested.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct VerboseReply {
    /// 1 on success, 0 on an application-level failure.
    #[serde(default)]
    pub status: Option<i64>,
    /// Human-readable reason for an application-level failure.
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_preserves_order() {
        let props = Properties::new()
            .insert("z", 1)
            .insert("a", 2)
            .insert("m", 3);

        let map = props.into_map();
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn test_merge_other_wins() {
        let base = Properties::new().insert("plan", "free").insert("seats", 1);
        let merged = base.merge(Properties::new().insert("plan", "pro"));

        assert_eq!(merged.get("plan").unwrap(), "pro");
        assert_eq!(merged.get("seats").unwrap(), 1);
    }

    #[test]
    fn test_from_value_non_object_is_empty() {
        let props = Properties::from(json!("not a map"));
        assert!(props.is_empty());
    }

    #[test]
    fn test_verbose_reply_parses_error_body() {
        let reply: VerboseReply =
            serde_json::from_str(r#"{"status": 0, "error": "bad token"}"#).unwrap();
        assert_eq!(reply.status, Some(0));
        assert_eq!(reply.error.as_deref(), Some("bad token"));
    }

    #[test]
    fn test_verbose_reply_tolerates_unknown_shape() {
        let reply: VerboseReply = serde_json::from_str(r#"{"processed": 3}"#).unwrap();
        assert!(reply.status.is_none());
        assert!(reply.error.is_none());
    }
}
