//! Policy data sources

use super::{
    computed_schema, configure_data_source, listing_item, listing_schema, lookup_key,
    read_response, resolve, save_listing, unconfigured,
};
use crate::api::policy::Policy;
use crate::resources::{policy, ResourceError};
use crate::util::{string_map_attr, string_slice_to_list};
use crate::PrismaCloudProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType};
use tfplug::types::{Dynamic, DynamicValue};

pub const TYPE_NAME: &str = "prismacloud_policy";
pub const LIST_TYPE_NAME: &str = "prismacloud_policies";

#[derive(Default)]
pub struct PolicyDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl PolicyDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lookup(
        &self,
        data: &PrismaCloudProviderData,
        config: &DynamicValue,
    ) -> Result<Policy, ResourceError> {
        let api = &data.client.policies();
        resolve(
            lookup_key(config, "policy_id", "name")?,
            move |id: String| async move { api.get(&id).await },
            move |name: String| async move { api.identify(&name).await },
        )
        .await
    }
}

#[async_trait]
impl DataSource for PolicyDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: computed_schema(
                policy::schema(),
                "Looks up a policy by ID or name",
                &["policy_id", "name"],
            ),
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(data) = &self.provider_data else {
            return unconfigured(request.config);
        };

        let result = self.lookup(data, &request.config).await;
        read_response(request.config, result, "policy", policy::save_policy)
    }
}

#[async_trait]
impl DataSourceWithConfigure for PolicyDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[derive(Default)]
pub struct PoliciesDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl PoliciesDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn summary(policy: &Policy) -> Dynamic {
    listing_item([
        ("policy_id", Dynamic::from(policy.policy_id.as_str())),
        ("name", Dynamic::from(policy.name.as_str())),
        ("policy_type", Dynamic::from(policy.policy_type.as_str())),
        ("severity", Dynamic::from(policy.severity.as_str())),
        ("cloud_type", Dynamic::from(policy.cloud_type.as_str())),
        ("description", Dynamic::from(policy.description.as_str())),
        ("enabled", Dynamic::from(policy.enabled)),
        ("system_default", Dynamic::from(policy.system_default)),
        ("remediable", Dynamic::from(policy.remediable)),
        ("policy_mode", Dynamic::from(policy.policy_mode.as_str())),
        ("labels", string_slice_to_list(&policy.labels)),
        ("open_alerts_count", Dynamic::from(policy.open_alerts_count)),
        ("last_modified_on", Dynamic::from(policy.last_modified_on)),
    ])
}

#[async_trait]
impl DataSource for PoliciesDataSource {
    fn type_name(&self) -> &str {
        LIST_TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = listing_schema(
            "Lists policies, optionally filtered",
            &[
                ("policy_id", AttributeType::String),
                ("name", AttributeType::String),
                ("policy_type", AttributeType::String),
                ("severity", AttributeType::String),
                ("cloud_type", AttributeType::String),
                ("description", AttributeType::String),
                ("enabled", AttributeType::Bool),
                ("system_default", AttributeType::Bool),
                ("remediable", AttributeType::Bool),
                ("policy_mode", AttributeType::String),
                ("labels", AttributeType::list(AttributeType::String)),
                ("open_alerts_count", AttributeType::Number),
                ("last_modified_on", AttributeType::Number),
            ],
        )
        .attribute(
            AttributeBuilder::string_map("filters")
                .description("Query parameters passed to the listing, e.g. policy.severity = high")
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

        let filters = string_map_attr(&request.config, "filters");
        let result = data.client.policies().list(&filters).await;
        read_response(request.config, result, "policies", |state, policies| {
            save_listing(state, policies.iter().map(summary).collect())
        })
    }
}

#[async_trait]
impl DataSourceWithConfigure for PoliciesDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}
