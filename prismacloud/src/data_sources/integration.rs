//! Integration data sources

use super::{
    computed_schema, configure_data_source, listing_item, listing_schema, lookup_key,
    read_response, resolve, save_listing, unconfigured,
};
use crate::api::integration::Integration;
use crate::resources::{integration, ResourceError};
use crate::util::string_attr;
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

pub const TYPE_NAME: &str = "prismacloud_integration";
pub const LIST_TYPE_NAME: &str = "prismacloud_integrations";

#[derive(Default)]
pub struct IntegrationDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl IntegrationDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lookup(
        &self,
        data: &PrismaCloudProviderData,
        config: &DynamicValue,
    ) -> Result<Integration, ResourceError> {
        let api = &data.client.integrations();
        resolve(
            lookup_key(config, "integration_id", "name")?,
            move |id: String| async move { api.get(&id).await },
            move |name: String| async move { api.identify(&name).await },
        )
        .await
    }
}

#[async_trait]
impl DataSource for IntegrationDataSource {
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
                integration::schema(),
                "Looks up an integration by ID or name; secrets are never returned",
                &["integration_id", "name"],
            ),
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
            "integration",
            integration::save_integration,
        )
    }
}

#[async_trait]
impl DataSourceWithConfigure for IntegrationDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[derive(Default)]
pub struct IntegrationsDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl IntegrationsDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn summary(integration: &Integration) -> Dynamic {
    listing_item([
        ("integration_id", Dynamic::from(integration.id.as_str())),
        ("name", Dynamic::from(integration.name.as_str())),
        ("description", Dynamic::from(integration.description.as_str())),
        (
            "integration_type",
            Dynamic::from(integration.integration_type.as_str()),
        ),
        ("enabled", Dynamic::from(integration.enabled)),
        ("status", Dynamic::from(integration.status.as_str())),
        ("valid", Dynamic::from(integration.valid)),
    ])
}

#[async_trait]
impl DataSource for IntegrationsDataSource {
    fn type_name(&self) -> &str {
        LIST_TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = listing_schema(
            "Lists integrations, optionally of one type",
            &[
                ("integration_id", AttributeType::String),
                ("name", AttributeType::String),
                ("description", AttributeType::String),
                ("integration_type", AttributeType::String),
                ("enabled", AttributeType::Bool),
                ("status", AttributeType::String),
                ("valid", AttributeType::Bool),
            ],
        )
        .attribute(
            AttributeBuilder::string("integration_type")
                .description("Only list integrations of this type")
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

        let integration_type = string_attr(&request.config, "integration_type");
        let filter = (!integration_type.is_empty()).then_some(integration_type.as_str());
        let result = data.client.integrations().list(filter).await;
        read_response(
            request.config,
            result,
            "integrations",
            |state, integrations| save_listing(state, integrations.iter().map(summary).collect()),
        )
    }
}

#[async_trait]
impl DataSourceWithConfigure for IntegrationsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}
