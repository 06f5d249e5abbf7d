//! Common types and utilities for the Prisma Cloud API

use serde::{Deserialize, Serialize};

/// Header carrying structured error messages on failed requests
pub const STATUS_HEADER: &str = "x-redlock-status";

/// Header carrying the session token
pub const AUTH_HEADER: &str = "x-redlock-auth";

/// One entry of the `x-redlock-status` header
#[derive(Debug, Clone, Deserialize)]
pub struct RedlockStatus {
    #[serde(rename = "i18nKey", default)]
    pub i18n_key: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub subject: Option<serde_json::Value>,
}

impl RedlockStatus {
    pub fn is_not_found(&self) -> bool {
        self.i18n_key.ends_with("not_found")
    }
}

/// Decode the status header; unparsable values are ignored
pub fn parse_status_header(value: &str) -> Vec<RedlockStatus> {
    serde_json::from_str(value).unwrap_or_default()
}

#[derive(Debug, thiserror::Error)]
#[error("API error details: {statuses:?}")]
pub struct ApiErrorDetails {
    pub statuses: Vec<RedlockStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct ApiQueryParams {
    params: Vec<(String, String)>,
}

impl ApiQueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.push((key.into(), v.to_string()));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        if self.params.is_empty() {
            String::new()
        } else {
            format!(
                "?{}",
                self.params
                    .iter()
                    .map(|(k, v)| format!(
                        "{}={}",
                        urlencoding::encode(k),
                        urlencoding::encode(v)
                    ))
                    .collect::<Vec<_>>()
                    .join("&")
            )
        }
    }
}

/// `{"id": .., "name": ..}` pairs returned by the name listing endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NameId {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Time window used by reports and RQL searches
///
/// `relative` and `to_now` windows carry an amount and unit, `absolute`
/// windows carry start and end timestamps in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(rename = "type", default)]
    pub range_type: String,
    #[serde(default)]
    pub value: TimeRangeValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRangeValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
}

/// Read an explicit JSON `null` like a missing field
pub fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_header_detects_not_found() {
        let statuses = parse_status_header(
            r#"[{"i18nKey":"policy_not_found","severity":"error","subject":"x"}]"#,
        );
        assert_eq!(statuses.len(), 1);
        assert!(statuses[0].is_not_found());
    }

    #[test]
    fn garbage_status_header_is_empty() {
        assert!(parse_status_header("not json").is_empty());
    }

    #[test]
    fn null_fields_read_as_default() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(deserialize_with = "deserialize_null_default", default)]
            items: Vec<String>,
        }
        let holder: Holder = serde_json::from_str(r#"{"items":null}"#).unwrap();
        assert!(holder.items.is_empty());
    }

    #[test]
    fn absolute_time_range_serializes_without_amount() {
        let range = TimeRange {
            range_type: "absolute".to_string(),
            value: TimeRangeValue {
                start_time: Some(1),
                end_time: Some(2),
                ..Default::default()
            },
        };
        assert_eq!(
            serde_json::to_value(&range).unwrap(),
            serde_json::json!({"type": "absolute", "value": {"startTime": 1, "endTime": 2}})
        );
    }

    #[test]
    fn query_string_encodes_values() {
        let params = ApiQueryParams::new()
            .add("policy.name", "a b")
            .add_optional("limit", None::<u32>)
            .add_optional("filter", Some("saved"));
        assert_eq!(params.to_query_string(), "?policy.name=a%20b&filter=saved");
        assert_eq!(ApiQueryParams::new().to_query_string(), "");
    }
}
