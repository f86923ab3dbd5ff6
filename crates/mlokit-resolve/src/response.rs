//! Status policy shared by every metadata call

use mlokit_core::errors::redact_query;
use mlokit_core::{HttpEffects, HttpEffectsExt, MlokitError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// Apply the metadata status policy: 404 is "not found" (`Ok(None)`), any
/// other non-2xx is a hard status error, and a 2xx body is returned as parsed.
pub(crate) fn metadata_body(status: u16, body: Option<Value>, url: &str) -> Result<Option<Value>> {
    match status {
        200..=299 => Ok(body),
        404 => {
            warn!(url = redact_query(url), "Metadata not found");
            Ok(None)
        }
        _ => Err(MlokitError::status(status, url)),
    }
}

/// GET `url` as JSON under the metadata status policy
pub(crate) async fn get_metadata<H>(
    http: &H,
    url: &str,
    headers: &[(String, String)],
) -> Result<Option<Value>>
where
    H: HttpEffects + ?Sized,
{
    debug!(url = redact_query(url), "Fetching metadata");
    let (status, body) = http.get_json(url, headers).await?;
    metadata_body(status, body, url)
}

/// GET `url` as JSON, treating every non-2xx status as "nothing here".
///
/// For per-region and per-bucket listings where an unavailable scope is
/// routine rather than exceptional.
pub(crate) async fn get_lenient<H>(
    http: &H,
    url: &str,
    headers: &[(String, String)],
) -> Result<Option<Value>>
where
    H: HttpEffects + ?Sized,
{
    debug!(url = redact_query(url), "Fetching listing");
    let (status, body) = http.get_json(url, headers).await?;
    if (200..300).contains(&status) {
        Ok(body)
    } else {
        warn!(url = redact_query(url), status, "Listing unavailable; treating as empty");
        Ok(None)
    }
}

/// Decode one array item into a record, skipping (and logging) items that do
/// not fit the record's shape.
pub(crate) fn decode_item<T: DeserializeOwned>(item: &Value, what: &str) -> Option<T> {
    match serde_json::from_value(item.clone()) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(what, error = %e, "Skipping malformed record");
            None
        }
    }
}

/// Items of the array at `field`, each decoded with [`decode_item`]; a
/// missing or non-array field yields nothing.
pub(crate) fn decode_list<T: DeserializeOwned>(body: &Value, field: &str, what: &str) -> Vec<T> {
    body.get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| decode_item(item, what))
                .collect()
        })
        .unwrap_or_default()
}

/// Number of entries in the array at `field`, before any decoding
pub(crate) fn listed_count(body: &Value, field: &str) -> usize {
    body.get(field).and_then(Value::as_array).map_or(0, Vec::len)
}

/// String cursor at `field`, if present
pub(crate) fn cursor_field(body: &Value, field: &str) -> Option<String> {
    body.get(field).and_then(Value::as_str).map(str::to_string)
}

/// `Some(s)` for a non-empty string
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: String,
    }

    #[test]
    fn test_status_policy() {
        assert_eq!(
            metadata_body(200, Some(json!({"a": 1})), "https://h/x").unwrap(),
            Some(json!({"a": 1}))
        );
        assert_eq!(metadata_body(404, Some(json!({})), "https://h/x").unwrap(), None);
        assert_eq!(
            metadata_body(500, None, "https://h/x?sig=s").unwrap_err(),
            MlokitError::status(500, "https://h/x")
        );
    }

    #[test]
    fn test_decode_list_skips_bad_items() {
        let body = json!({"value": [{"id": "a"}, 7, {"name": "no id"}, {"id": "b"}]});
        let items: Vec<Item> = decode_list(&body, "value", "item");
        assert_eq!(items, vec![Item { id: "a".into() }, Item { id: "b".into() }]);
        let none: Vec<Item> = decode_list(&json!({"value": "x"}), "value", "item");
        assert!(none.is_empty());
    }

    #[test]
    fn test_listed_count_includes_malformed() {
        let body = json!({"data": [1, "two", {"id": "c"}], "next": "t2"});
        assert_eq!(listed_count(&body, "data"), 3);
        assert_eq!(listed_count(&body, "missing"), 0);
        assert_eq!(cursor_field(&body, "next"), Some("t2".to_string()));
        assert_eq!(cursor_field(&body, "data"), None);
    }
}
