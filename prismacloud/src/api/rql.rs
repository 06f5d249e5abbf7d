//! RQL search and search history API implementation

use super::common::{deserialize_null_default, TimeRange};
use super::{ApiError, ApiQueryParams, Client};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

pub const SEARCH_TYPES: &[&str] = &["config", "event", "network"];
pub const HISTORY_FILTERS: &[&str] = &["saved", "recent"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    pub time_range: TimeRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_resource_json: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub search_type: String,
    #[serde(default)]
    pub cloud_type: String,
    #[serde(default)]
    pub time_range: TimeRange,
    #[serde(default)]
    pub data: SearchData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchData {
    #[serde(default)]
    pub total_rows: i64,
    /// Result rows; their shape depends on the search type
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub items: Vec<serde_json::Value>,
}

/// A saved or recent search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub saved: bool,
    #[serde(default)]
    pub search_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cloud_type: String,
    #[serde(default)]
    pub time_range: TimeRange,
    #[serde(default, skip_serializing)]
    pub created_by: String,
    #[serde(default, skip_serializing)]
    pub last_modified_by: String,
    #[serde(default, skip_serializing)]
    pub created_on: i64,
    #[serde(default, skip_serializing)]
    pub last_modified_on: i64,
}

/// Body for saving a search under a name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSearchRequest {
    pub id: String,
    pub name: String,
    pub description: String,
    pub query: String,
    pub saved: bool,
    pub time_range: TimeRange,
}

pub struct RqlApi<'a> {
    client: &'a Client,
}

impl<'a> RqlApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Run a query; `search_type` selects the config, event or network endpoint
    pub async fn search(
        &self,
        search_type: &str,
        request: &SearchRequest,
    ) -> Result<SearchResponse, ApiError> {
        let path = match search_type {
            "config" => "/search/config",
            "event" => "/search/event",
            "network" => "/search",
            other => {
                return Err(ApiError::ParseError(format!(
                    "unknown search type {:?}",
                    other
                )))
            }
        };
        self.client.post(path, request).await
    }

    pub async fn history(
        &self,
        filter: &str,
        limit: Option<i64>,
    ) -> Result<Vec<HistoryEntry>, ApiError> {
        let params = ApiQueryParams::new()
            .add("filter", filter)
            .add_optional("limit", limit);
        self.client.get_with_params("/search/history", &params).await
    }

    pub async fn identify_saved(&self, name: &str) -> Result<String, ApiError> {
        self.history("saved", None)
            .await?
            .into_iter()
            .find(|h| h.name == name)
            .map(|h| h.id)
            .ok_or_else(|| ApiError::ObjectNotFound(format!("saved search {:?}", name)))
    }

    pub async fn get_history(&self, id: &str) -> Result<HistoryEntry, ApiError> {
        self.client.get(&format!("/search/history/{}", id)).await
    }

    pub async fn save(&self, request: &SaveSearchRequest) -> Result<(), ApiError> {
        self.client
            .post::<IgnoredAny, _>(&format!("/search/history/{}", request.id), request)
            .await
            .map(|_| ())
    }

    pub async fn delete_history(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .delete::<IgnoredAny>(&format!("/search/history/{}", id))
            .await
            .map(|_| ())
    }
}
