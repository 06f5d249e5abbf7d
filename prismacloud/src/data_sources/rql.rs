//! RQL search data sources
//!
//! `prismacloud_rql_search` runs a query and returns its rows; the search it
//! creates can then be kept with the `prismacloud_saved_search` resource.
//! The historic search data sources read saved and recent searches.

use super::{
    computed_schema, configure_data_source, listing_item, listing_schema, lookup_key,
    read_response, resolve, save_listing, unconfigured,
};
use crate::api::rql::{HistoryEntry, SearchRequest, SearchResponse, HISTORY_FILTERS, SEARCH_TYPES};
use crate::resources::{parse_time_range, saved_search, time_range_block, ResourceError};
use crate::util::{int_attr, string_attr};
use crate::PrismaCloudProviderData;
use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

pub const SEARCH_TYPE_NAME: &str = "prismacloud_rql_search";
pub const HISTORIC_TYPE_NAME: &str = "prismacloud_rql_historic_search";
pub const HISTORIC_LIST_TYPE_NAME: &str = "prismacloud_rql_historic_searches";

const DEFAULT_SEARCH_TYPE: &str = "config";
const DEFAULT_HISTORY_FILTER: &str = "saved";

fn search_schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Runs an RQL query and returns the matching rows")
        .attribute(
            AttributeBuilder::string("search_type")
                .description("config, event or network; defaults to config")
                .optional()
                .computed()
                .validator(StringOneOfValidator::create(SEARCH_TYPES))
                .build(),
        )
        .attribute(AttributeBuilder::string("query").required().build())
        .attribute(
            AttributeBuilder::number("limit")
                .description("Maximum number of rows to return")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::bool("with_resource_json")
                .description("Include the raw resource JSON in config search rows")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::string("search_id")
                .description("ID of the search, usable with prismacloud_saved_search")
                .computed()
                .build(),
        )
        .attribute(AttributeBuilder::string("name").computed().build())
        .attribute(AttributeBuilder::string("description").computed().build())
        .attribute(AttributeBuilder::string("cloud_type").computed().build())
        .attribute(AttributeBuilder::number("total_rows").computed().build())
        .attribute(
            AttributeBuilder::new(
                "items",
                AttributeType::list(AttributeType::map(AttributeType::String)),
            )
            .description("Result rows with every field rendered as a string")
            .computed()
            .build(),
        )
        .block(time_range_block(1))
        .build()
}

fn search_type(config: &DynamicValue) -> String {
    let search_type = string_attr(config, "search_type");
    if search_type.is_empty() {
        DEFAULT_SEARCH_TYPE.to_string()
    } else {
        search_type
    }
}

pub fn parse_search(config: &DynamicValue) -> SearchRequest {
    let limit = int_attr(config, "limit");
    SearchRequest {
        query: string_attr(config, "query"),
        time_range: parse_time_range(config).unwrap_or_default(),
        limit: (limit > 0).then_some(limit),
        with_resource_json: config.attribute("with_resource_json").as_bool(),
    }
}

/// Rows come back in a shape that depends on the search type, so every
/// field is flattened to a string; nested values keep their JSON form
fn row_value(row: &serde_json::Value) -> Dynamic {
    let render = |value: &serde_json::Value| match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let fields: HashMap<String, Dynamic> = match row.as_object() {
        Some(object) => object
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), Dynamic::from(render(value))))
            .collect(),
        None => HashMap::from([("value".to_string(), Dynamic::from(render(row)))]),
    };
    Dynamic::Map(fields)
}

pub fn save_search(state: &mut DynamicValue, response: &SearchResponse) {
    state.set_attribute("search_id", response.id.as_str());
    state.set_attribute("name", response.name.as_str());
    state.set_attribute("description", response.description.as_str());
    state.set_attribute("cloud_type", response.cloud_type.as_str());
    state.set_attribute("total_rows", response.data.total_rows);
    state.set_attribute(
        "items",
        Dynamic::List(response.data.items.iter().map(row_value).collect()),
    );
}

#[derive(Default)]
pub struct RqlSearchDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl RqlSearchDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for RqlSearchDataSource {
    fn type_name(&self) -> &str {
        SEARCH_TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: search_schema(),
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(data) = &self.provider_data else {
            return unconfigured(request.config);
        };

        let mut config = request.config;
        let search_type = search_type(&config);
        config.set_attribute("search_type", search_type.as_str());

        let search = parse_search(&config);
        let result = data.client.rql().search(&search_type, &search).await;
        read_response(config, result, "RQL search", save_search)
    }
}

#[async_trait]
impl DataSourceWithConfigure for RqlSearchDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

fn historic_schema() -> Schema {
    let mut schema = computed_schema(
        saved_search::schema(),
        "Looks up a historic RQL search by ID, or a saved search by name",
        &["search_id", "name"],
    );
    schema
        .block
        .attributes
        .push(AttributeBuilder::bool("saved").computed().build());
    schema
}

fn save_history_entry(state: &mut DynamicValue, entry: &HistoryEntry) {
    saved_search::save_saved_search(state, entry);
    state.set_attribute("saved", entry.saved);
}

#[derive(Default)]
pub struct RqlHistoricSearchDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl RqlHistoricSearchDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lookup(
        &self,
        data: &PrismaCloudProviderData,
        config: &DynamicValue,
    ) -> Result<HistoryEntry, ResourceError> {
        let api = &data.client.rql();
        resolve(
            lookup_key(config, "search_id", "name")?,
            move |id: String| async move { api.get_history(&id).await },
            move |name: String| async move { api.identify_saved(&name).await },
        )
        .await
    }
}

#[async_trait]
impl DataSource for RqlHistoricSearchDataSource {
    fn type_name(&self) -> &str {
        HISTORIC_TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: historic_schema(),
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(data) = &self.provider_data else {
            return unconfigured(request.config);
        };

        let result = self.lookup(data, &request.config).await;
        read_response(
            request.config,
            result,
            "historic RQL search",
            save_history_entry,
        )
    }
}

#[async_trait]
impl DataSourceWithConfigure for RqlHistoricSearchDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[derive(Default)]
pub struct RqlHistoricSearchesDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl RqlHistoricSearchesDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn summary(entry: &HistoryEntry) -> Dynamic {
    listing_item([
        ("search_id", Dynamic::from(entry.id.as_str())),
        ("name", Dynamic::from(entry.name.as_str())),
        ("description", Dynamic::from(entry.description.as_str())),
        ("query", Dynamic::from(entry.query.as_str())),
        ("search_type", Dynamic::from(entry.search_type.as_str())),
        ("cloud_type", Dynamic::from(entry.cloud_type.as_str())),
        ("saved", Dynamic::from(entry.saved)),
        ("created_by", Dynamic::from(entry.created_by.as_str())),
        ("last_modified_on", Dynamic::from(entry.last_modified_on)),
    ])
}

#[async_trait]
impl DataSource for RqlHistoricSearchesDataSource {
    fn type_name(&self) -> &str {
        HISTORIC_LIST_TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = listing_schema(
            "Lists saved or recent RQL searches",
            &[
                ("search_id", AttributeType::String),
                ("name", AttributeType::String),
                ("description", AttributeType::String),
                ("query", AttributeType::String),
                ("search_type", AttributeType::String),
                ("cloud_type", AttributeType::String),
                ("saved", AttributeType::Bool),
                ("created_by", AttributeType::String),
                ("last_modified_on", AttributeType::Number),
            ],
        )
        .attribute(
            AttributeBuilder::string("filter")
                .description("saved or recent; defaults to saved")
                .optional()
                .computed()
                .validator(StringOneOfValidator::create(HISTORY_FILTERS))
                .build(),
        )
        .attribute(
            AttributeBuilder::number("limit")
                .description("Maximum number of searches to return")
                .optional()
                .build(),
        )
        .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(data) = &self.provider_data else {
            return unconfigured(request.config);
        };

        let mut config = request.config;
        let mut filter = string_attr(&config, "filter");
        if filter.is_empty() {
            filter = DEFAULT_HISTORY_FILTER.to_string();
        }
        config.set_attribute("filter", filter.as_str());
        let limit = int_attr(&config, "limit");

        let result = data
            .client
            .rql()
            .history(&filter, (limit > 0).then_some(limit))
            .await;
        read_response(config, result, "historic RQL searches", |state, entries| {
            save_listing(state, entries.iter().map(summary).collect())
        })
    }
}

#[async_trait]
impl DataSourceWithConfigure for RqlHistoricSearchesDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::rql::SearchData;
    use crate::util::single_block;
    use serde_json::json;

    fn configured_search() -> DynamicValue {
        let mut range = HashMap::new();
        range.insert("type".to_string(), Dynamic::from("relative"));
        range.insert("amount".to_string(), Dynamic::from(24i64));
        range.insert("unit".to_string(), Dynamic::from("hour"));

        let mut config = DynamicValue::empty_object();
        config.set_attribute("query", "config from cloud.resource where api.name = 'x'");
        config.set_attribute("limit", 10i64);
        config.set_attribute("time_range", single_block(range));
        config
    }

    #[test]
    fn search_type_defaults_to_config() {
        let mut config = configured_search();
        assert_eq!(search_type(&config), "config");
        config.set_attribute("search_type", "event");
        assert_eq!(search_type(&config), "event");
    }

    #[test]
    fn parse_search_reads_query_and_window() {
        let search = parse_search(&configured_search());
        assert_eq!(search.limit, Some(10));
        assert_eq!(search.with_resource_json, None);
        assert_eq!(search.time_range.range_type, "relative");
        assert_eq!(search.time_range.value.amount, Some(24));
    }

    #[test]
    fn rows_are_flattened_to_strings() {
        let response = SearchResponse {
            id: "srch-1".to_string(),
            data: SearchData {
                total_rows: 1,
                items: vec![json!({
                    "name": "bucket",
                    "accountId": 1234,
                    "public": true,
                    "tags": {"env": "prod"},
                    "deleted": null
                })],
            },
            ..Default::default()
        };

        let mut state = configured_search();
        save_search(&mut state, &response);

        assert_eq!(state.attribute("search_id").as_str(), Some("srch-1"));
        let rows = state.attribute("items").as_list().expect("items");
        let row = &rows[0];
        assert_eq!(row.get("name").and_then(|v| v.as_str()), Some("bucket"));
        assert_eq!(row.get("accountId").and_then(|v| v.as_str()), Some("1234"));
        assert_eq!(row.get("public").and_then(|v| v.as_str()), Some("true"));
        assert_eq!(
            row.get("tags").and_then(|v| v.as_str()),
            Some(r#"{"env":"prod"}"#)
        );
        assert!(row.get("deleted").is_none());
    }
}
