//! Form-urlencoded payload encoding.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};

/// Characters escaped by `encodeURIComponent`: everything except
/// alphanumerics and `- _ . ! ~ * ' ( )`. Notably encodes space as `%20`,
/// not `+`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Encodes a flat mapping as an `application/x-www-form-urlencoded` body.
///
/// Null values are skipped entirely. Objects and arrays are serialized to
/// their JSON text before encoding; strings and numbers pass through
/// as-is; any other value is dropped. Entries appear in the mapping's
/// insertion order.
pub fn encode_form(body: &Map<String, Value>) -> String {
    let mut out = String::new();

    for (key, value) in body {
        let text = match value {
            Value::Null | Value::Bool(_) => continue,
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Object(_) | Value::Array(_) => {
                serde_json::to_string(value).unwrap_or_default()
            }
        };
        if !out.is_empty() {
            out.push('&');
        }
        out.extend(utf8_percent_encode(key, COMPONENT));
        out.push('=');
        out.extend(utf8_percent_encode(&text, COMPONENT));
    }

    out
}
