//! Integration resource implementation

use super::{
    configure_resource, create_response, delete_response, not_configured, read_response,
    update_response, ResourceError,
};
use crate::api::integration::{Header, Integration, IntegrationConfig, INTEGRATION_TYPES};
use crate::poll::poll_until_success;
use crate::util::{
    block_first, block_list, bool_attr, single_block, string_attr, string_list_attr,
    string_or_null, string_slice_to_list, Attributes,
};
use crate::PrismaCloudProviderData;
use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, NestedBlockBuilder, Schema, SchemaBuilder};
use tfplug::types::{Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

pub const TYPE_NAME: &str = "prismacloud_integration";

const KIND: &str = "integration";

/// Write-only settings; the API masks them, so state keeps the configured value
const SECRET_FIELDS: &[&str] = &[
    "auth_token",
    "api_token",
    "api_key",
    "password",
    "integration_key",
    "secret_key",
    "access_key",
    "connection_string",
];

const PLAIN_FIELDS: &[&str] = &[
    "queue_url",
    "more_info",
    "url",
    "api_url",
    "host_url",
    "login",
    "org_id",
    "source_id",
    "account_id",
    "role_arn",
    "external_id",
    "region",
    "tenant_id",
    "user_name",
    "version",
];

#[derive(Default)]
pub struct IntegrationResource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl IntegrationResource {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn schema() -> Schema {
    let mut config_block = NestedBlockBuilder::list("integration_config")
        .description("Type specific settings; only those relevant to the type are sent")
        .min_items(1)
        .max_items(1);
    for name in PLAIN_FIELDS {
        config_block = config_block.attribute(AttributeBuilder::string(name).optional().build());
    }
    for name in SECRET_FIELDS {
        config_block = config_block.attribute(
            AttributeBuilder::string(name)
                .optional()
                .sensitive()
                .build(),
        );
    }
    let config_block = config_block
        .attribute(AttributeBuilder::string_list("tables").optional().build())
        .block(
            NestedBlockBuilder::list("headers")
                .attribute(AttributeBuilder::string("key").required().build())
                .attribute(AttributeBuilder::string("value").optional().sensitive().build())
                .attribute(
                    AttributeBuilder::bool("secure")
                        .default(StaticDefault::bool(false))
                        .build(),
                )
                .attribute(
                    AttributeBuilder::bool("read_only")
                        .default(StaticDefault::bool(false))
                        .build(),
                )
                .build(),
        )
        .build();

    SchemaBuilder::new()
        .version(0)
        .description("Manages an outbound integration used for notifications")
        .attribute(
            AttributeBuilder::string("id")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::string("integration_id")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(AttributeBuilder::string("name").required().build())
        .attribute(AttributeBuilder::string("description").optional().build())
        .attribute(
            AttributeBuilder::string("integration_type")
                .required()
                .validator(StringOneOfValidator::create(INTEGRATION_TYPES))
                .plan_modifier(RequiresReplaceIfChanged::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::bool("enabled")
                .default(StaticDefault::bool(true))
                .build(),
        )
        .attribute(AttributeBuilder::string("created_by").computed().build())
        .attribute(AttributeBuilder::number("created_ts").computed().build())
        .attribute(AttributeBuilder::string("last_modified_by").computed().build())
        .attribute(AttributeBuilder::number("last_modified_ts").computed().build())
        .attribute(AttributeBuilder::string("status").computed().build())
        .attribute(AttributeBuilder::bool("valid").computed().build())
        .attribute(
            AttributeBuilder::string_map("reason")
                .description("Details of the last failure: last_used, error_type and message")
                .computed()
                .build(),
        )
        .block(config_block)
        .build()
}

fn parse_integration_config(src: &impl Attributes) -> IntegrationConfig {
    IntegrationConfig {
        queue_url: string_attr(src, "queue_url"),
        more_info: string_attr(src, "more_info"),
        url: string_attr(src, "url"),
        auth_token: string_attr(src, "auth_token"),
        api_token: string_attr(src, "api_token"),
        api_key: string_attr(src, "api_key"),
        api_url: string_attr(src, "api_url"),
        host_url: string_attr(src, "host_url"),
        login: string_attr(src, "login"),
        password: string_attr(src, "password"),
        integration_key: string_attr(src, "integration_key"),
        secret_key: string_attr(src, "secret_key"),
        access_key: string_attr(src, "access_key"),
        org_id: string_attr(src, "org_id"),
        source_id: string_attr(src, "source_id"),
        account_id: string_attr(src, "account_id"),
        role_arn: string_attr(src, "role_arn"),
        external_id: string_attr(src, "external_id"),
        region: string_attr(src, "region"),
        tenant_id: string_attr(src, "tenant_id"),
        user_name: string_attr(src, "user_name"),
        version: string_attr(src, "version"),
        connection_string: string_attr(src, "connection_string"),
        headers: block_list(src, "headers")
            .iter()
            .map(|header| Header {
                key: string_attr(header, "key"),
                value: string_attr(header, "value"),
                secure: bool_attr(header, "secure"),
                read_only: bool_attr(header, "read_only"),
            })
            .collect(),
        tables: string_list_attr(src, "tables"),
    }
}

pub fn parse_integration(value: &DynamicValue) -> Integration {
    Integration {
        id: string_attr(value, "integration_id"),
        name: string_attr(value, "name"),
        description: string_attr(value, "description"),
        integration_type: string_attr(value, "integration_type"),
        integration_config: parse_integration_config(&block_first(value, "integration_config")),
        enabled: bool_attr(value, "enabled"),
        ..Default::default()
    }
}

fn plain_fields(config: &IntegrationConfig) -> [(&'static str, &String); 15] {
    [
        ("queue_url", &config.queue_url),
        ("more_info", &config.more_info),
        ("url", &config.url),
        ("api_url", &config.api_url),
        ("host_url", &config.host_url),
        ("login", &config.login),
        ("org_id", &config.org_id),
        ("source_id", &config.source_id),
        ("account_id", &config.account_id),
        ("role_arn", &config.role_arn),
        ("external_id", &config.external_id),
        ("region", &config.region),
        ("tenant_id", &config.tenant_id),
        ("user_name", &config.user_name),
        ("version", &config.version),
    ]
}

fn integration_config_value(
    config: &IntegrationConfig,
    prior: &HashMap<String, Dynamic>,
) -> Dynamic {
    let mut item: HashMap<String, Dynamic> = plain_fields(config)
        .into_iter()
        .map(|(name, value)| (name.to_string(), string_or_null(value)))
        .collect();
    for name in SECRET_FIELDS {
        let kept = prior.get(*name).cloned().unwrap_or(Dynamic::Null);
        item.insert(name.to_string(), kept);
    }

    let prior_headers = block_list(prior, "headers");
    let headers = config
        .headers
        .iter()
        .map(|header| {
            // Secure header values come back masked
            let value = if header.secure {
                prior_headers
                    .iter()
                    .find(|h| string_attr(*h, "key") == header.key)
                    .and_then(|h| h.get("value").cloned())
                    .unwrap_or(Dynamic::Null)
            } else {
                string_or_null(&header.value)
            };
            let mut h = HashMap::new();
            h.insert("key".to_string(), Dynamic::from(header.key.as_str()));
            h.insert("value".to_string(), value);
            h.insert("secure".to_string(), Dynamic::from(header.secure));
            h.insert("read_only".to_string(), Dynamic::from(header.read_only));
            Dynamic::Map(h)
        })
        .collect();
    item.insert("headers".to_string(), Dynamic::List(headers));

    let tables = if config.tables.is_empty() {
        Dynamic::Null
    } else {
        string_slice_to_list(&config.tables)
    };
    item.insert("tables".to_string(), tables);
    single_block(item)
}

pub fn save_integration(state: &mut DynamicValue, integration: &Integration) {
    let prior = block_first(state, "integration_config");

    state.set_attribute("id", integration.id.as_str());
    state.set_attribute("integration_id", integration.id.as_str());
    state.set_attribute("name", integration.name.as_str());
    state.set_attribute("description", string_or_null(&integration.description));
    state.set_attribute("integration_type", integration.integration_type.as_str());
    state.set_attribute("enabled", integration.enabled);
    state.set_attribute(
        "integration_config",
        integration_config_value(&integration.integration_config, &prior),
    );
    state.set_attribute("created_by", integration.created_by.as_str());
    state.set_attribute("created_ts", integration.created_ts);
    state.set_attribute("last_modified_by", integration.last_modified_by.as_str());
    state.set_attribute("last_modified_ts", integration.last_modified_ts);
    state.set_attribute("status", integration.status.as_str());
    state.set_attribute("valid", integration.valid);

    let reason = match &integration.reason {
        Some(reason) => {
            let mut map = HashMap::new();
            map.insert(
                "last_used".to_string(),
                Dynamic::from(reason.last_used.to_string()),
            );
            map.insert(
                "error_type".to_string(),
                Dynamic::from(reason.error_type.as_str()),
            );
            map.insert("message".to_string(), Dynamic::from(reason.message.as_str()));
            Dynamic::Map(map)
        }
        None => Dynamic::Map(HashMap::new()),
    };
    state.set_attribute("reason", reason);
}

impl IntegrationResource {
    async fn create_integration(
        &self,
        ctx: &Context,
        data: &PrismaCloudProviderData,
        state: &mut DynamicValue,
    ) -> Result<(), ResourceError> {
        let integration = parse_integration(state);
        let api = data.client.integrations();

        let created = api.create(&integration).await?;
        let id = match created.filter(|i| !i.id.is_empty()) {
            Some(i) => i.id,
            None => poll_until_success(ctx, &data.poll, || api.identify(&integration.name)).await?,
        };
        state.set_attribute("id", id.as_str());
        state.set_attribute("integration_id", id.as_str());

        let created = poll_until_success(ctx, &data.poll, || api.get(&id)).await?;
        save_integration(state, &created);
        Ok(())
    }
}

#[async_trait]
impl Resource for IntegrationResource {
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

        let result = self.create_integration(&ctx, data, &mut state).await;
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
        let result = data.client.integrations().get(&id).await;
        read_response(request.current_state, result, KIND, save_integration)
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![not_configured()],
            };
        };

        let mut integration = parse_integration(&request.planned_state);
        integration.id = string_attr(&request.prior_state, "id");
        let api = data.client.integrations();

        let result = match api.update(&integration).await {
            Ok(()) => api.get(&integration.id).await,
            Err(e) => Err(e),
        };
        update_response(
            request.planned_state,
            request.prior_state,
            result,
            KIND,
            save_integration,
        )
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let id = string_attr(&request.prior_state, "id");
        delete_response(data.client.integrations().delete(&id).await, KIND)
    }
}

#[async_trait]
impl ResourceWithConfigure for IntegrationResource {
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

    fn slack_config() -> DynamicValue {
        let mut block: HashMap<String, Dynamic> = PLAIN_FIELDS
            .iter()
            .chain(SECRET_FIELDS)
            .map(|name| (name.to_string(), Dynamic::Null))
            .collect();
        block.insert(
            "url".to_string(),
            Dynamic::from("https://hooks.slack.com/services/T0/B0/x"),
        );
        block.insert("auth_token".to_string(), Dynamic::from("xoxb-secret"));
        block.insert("tables".to_string(), Dynamic::Null);
        block.insert("headers".to_string(), Dynamic::List(vec![]));

        let mut value = DynamicValue::empty_object();
        value.set_attribute("name", "alerts channel");
        value.set_attribute("integration_type", "slack");
        value.set_attribute("enabled", true);
        value.set_attribute("integration_config", single_block(block));
        value
    }

    #[test]
    fn parse_then_save_reproduces_configuration() {
        let config = slack_config();
        let mut echoed = parse_integration(&config);
        echoed.id = "int-1".to_string();
        // Masked by the API
        echoed.integration_config.auth_token = "****".to_string();

        let mut state = config.clone();
        save_integration(&mut state, &echoed);

        for name in ["name", "integration_type", "enabled", "integration_config"] {
            assert_eq!(state.attribute(name), config.attribute(name), "{}", name);
        }
        assert_eq!(state.attribute("integration_id").as_str(), Some("int-1"));
    }

    #[test]
    fn secure_header_value_is_kept_from_state() {
        let mut prior_header = HashMap::new();
        prior_header.insert("key".to_string(), Dynamic::from("Authorization"));
        prior_header.insert("value".to_string(), Dynamic::from("Bearer abc"));
        let mut prior = HashMap::new();
        prior.insert(
            "headers".to_string(),
            Dynamic::List(vec![Dynamic::Map(prior_header)]),
        );

        let config = IntegrationConfig {
            url: "https://example.com/hook".to_string(),
            headers: vec![Header {
                key: "Authorization".to_string(),
                value: "****".to_string(),
                secure: true,
                read_only: false,
            }],
            ..Default::default()
        };

        let value = integration_config_value(&config, &prior);
        let headers = block_list(&value.as_list().unwrap()[0], "headers");
        assert_eq!(string_attr(&headers[0], "value"), "Bearer abc");
    }
}
