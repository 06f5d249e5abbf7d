//! Saved search resource implementation
//!
//! Saves the result of an RQL search (see the `prismacloud_rql_search` data
//! source) under a name. Saved searches cannot be edited, so every argument
//! forces a new resource.

use super::{
    configure_resource, create_response, delete_response, not_configured, parse_time_range,
    read_response, time_range_block, time_range_value, update_response, ResourceError,
};
use crate::api::rql::{HistoryEntry, SaveSearchRequest};
use crate::api::ApiError;
use crate::poll::poll_until_success;
use crate::util::{string_attr, string_or_null};
use crate::PrismaCloudProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, Schema, SchemaBuilder};
use tfplug::types::DynamicValue;

pub const TYPE_NAME: &str = "prismacloud_saved_search";

const KIND: &str = "saved search";

#[derive(Default)]
pub struct SavedSearchResource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl SavedSearchResource {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn schema() -> Schema {
    let mut time_range = time_range_block(1);
    for attr in &mut time_range.block.attributes {
        attr.plan_modifiers.push(RequiresReplaceIfChanged::create());
    }

    SchemaBuilder::new()
        .version(0)
        .description("Saves an RQL search under a name")
        .attribute(
            AttributeBuilder::string("id")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::string("search_id")
                .description("ID of the search to save, from prismacloud_rql_search")
                .required()
                .plan_modifier(RequiresReplaceIfChanged::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::string("name")
                .required()
                .plan_modifier(RequiresReplaceIfChanged::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::string("description")
                .optional()
                .plan_modifier(RequiresReplaceIfChanged::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::string("query")
                .required()
                .plan_modifier(RequiresReplaceIfChanged::create())
                .build(),
        )
        .attribute(AttributeBuilder::string("search_type").computed().build())
        .attribute(AttributeBuilder::string("cloud_type").computed().build())
        .attribute(AttributeBuilder::string("created_by").computed().build())
        .attribute(AttributeBuilder::number("created_on").computed().build())
        .attribute(AttributeBuilder::string("last_modified_by").computed().build())
        .attribute(AttributeBuilder::number("last_modified_on").computed().build())
        .block(time_range)
        .build()
}

pub fn parse_saved_search(value: &DynamicValue) -> SaveSearchRequest {
    SaveSearchRequest {
        id: string_attr(value, "search_id"),
        name: string_attr(value, "name"),
        description: string_attr(value, "description"),
        query: string_attr(value, "query"),
        saved: true,
        time_range: parse_time_range(value).unwrap_or_default(),
    }
}

pub fn save_saved_search(state: &mut DynamicValue, entry: &HistoryEntry) {
    state.set_attribute("id", entry.id.as_str());
    state.set_attribute("search_id", entry.id.as_str());
    state.set_attribute("name", entry.name.as_str());
    state.set_attribute("description", string_or_null(&entry.description));
    state.set_attribute("query", entry.query.as_str());
    state.set_attribute("search_type", entry.search_type.as_str());
    state.set_attribute("cloud_type", entry.cloud_type.as_str());
    state.set_attribute("created_by", entry.created_by.as_str());
    state.set_attribute("created_on", entry.created_on);
    state.set_attribute("last_modified_by", entry.last_modified_by.as_str());
    state.set_attribute("last_modified_on", entry.last_modified_on);
    state.set_attribute("time_range", time_range_value(Some(&entry.time_range)));
}

/// A search only counts as created once the history marks it saved
async fn saved_entry(data: &PrismaCloudProviderData, id: &str) -> Result<HistoryEntry, ApiError> {
    let entry = data.client.rql().get_history(id).await?;
    if entry.saved {
        Ok(entry)
    } else {
        Err(ApiError::ObjectNotFound(format!("saved search {}", id)))
    }
}

impl SavedSearchResource {
    async fn create_saved_search(
        &self,
        ctx: &Context,
        data: &PrismaCloudProviderData,
        state: &mut DynamicValue,
    ) -> Result<(), ResourceError> {
        let request = parse_saved_search(state);
        data.client.rql().save(&request).await?;
        state.set_attribute("id", request.id.as_str());

        let created = poll_until_success(ctx, &data.poll, || saved_entry(data, &request.id)).await?;
        save_saved_search(state, &created);
        Ok(())
    }
}

#[async_trait]
impl Resource for SavedSearchResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: schema(),
            diagnostics: vec![],
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut state = request.planned_state;
        let Some(data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: state,
                diagnostics: vec![not_configured()],
            };
        };

        let result = self.create_saved_search(&ctx, data, &mut state).await;
        create_response(state, result, KIND)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(data) = &self.provider_data else {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![not_configured()],
            };
        };

        let id = string_attr(&request.current_state, "id");
        let result = saved_entry(data, &id).await;
        read_response(request.current_state, result, KIND, save_saved_search)
    }

    /// Every argument forces replacement, so only computed values can change
    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![not_configured()],
            };
        };

        let id = string_attr(&request.prior_state, "id");
        let result = saved_entry(data, &id).await;
        update_response(
            request.planned_state,
            request.prior_state,
            result,
            KIND,
            save_saved_search,
        )
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let id = string_attr(&request.prior_state, "id");
        delete_response(data.client.rql().delete_history(&id).await, KIND)
    }
}

#[async_trait]
impl ResourceWithConfigure for SavedSearchResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        configure_resource(&mut self.provider_data, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::single_block;
    use std::collections::HashMap;
    use tfplug::types::Dynamic;

    fn configured_search() -> DynamicValue {
        let mut range = HashMap::new();
        range.insert("type".to_string(), Dynamic::from("to_now"));
        range.insert("amount".to_string(), Dynamic::Null);
        range.insert("unit".to_string(), Dynamic::from("epoch"));
        range.insert("start_time".to_string(), Dynamic::Null);
        range.insert("end_time".to_string(), Dynamic::Null);

        let mut value = DynamicValue::empty_object();
        value.set_attribute("search_id", "srch-1");
        value.set_attribute("name", "open buckets");
        value.set_attribute("query", "config from cloud.resource where api.name = 'x'");
        value.set_attribute("time_range", single_block(range));
        value
    }

    #[test]
    fn parse_marks_search_saved() {
        let request = parse_saved_search(&configured_search());
        assert!(request.saved);
        assert_eq!(request.id, "srch-1");
        assert_eq!(request.time_range.range_type, "to_now");
    }

    #[test]
    fn parse_then_save_reproduces_configuration() {
        let config = configured_search();
        let request = parse_saved_search(&config);
        let echoed = HistoryEntry {
            id: request.id.clone(),
            name: request.name.clone(),
            description: request.description.clone(),
            query: request.query.clone(),
            saved: true,
            search_type: "config".to_string(),
            time_range: request.time_range.clone(),
            ..Default::default()
        };

        let mut state = config.clone();
        save_saved_search(&mut state, &echoed);

        for name in ["search_id", "name", "query", "time_range"] {
            assert_eq!(state.attribute(name), config.attribute(name), "{}", name);
        }
        assert!(state.attribute("description").is_null());
    }

    #[test]
    fn time_range_attributes_force_replacement() {
        let schema = schema();
        let time_range = &schema.block.block_types[0];
        assert!(time_range
            .block
            .attributes
            .iter()
            .all(|attr| !attr.plan_modifiers.is_empty()));
    }
}
