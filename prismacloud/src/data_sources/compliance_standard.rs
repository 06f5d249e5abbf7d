//! Compliance standard data sources

use super::{
    computed_schema, configure_data_source, listing_item, listing_schema, lookup_key,
    read_response, resolve, save_listing, unconfigured,
};
use crate::api::compliance::Standard;
use crate::resources::{compliance_standard, ResourceError};
use crate::util::string_slice_to_list;
use crate::PrismaCloudProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::AttributeType;
use tfplug::types::{Dynamic, DynamicValue};

pub const TYPE_NAME: &str = "prismacloud_compliance_standard";
pub const LIST_TYPE_NAME: &str = "prismacloud_compliance_standards";

#[derive(Default)]
pub struct ComplianceStandardDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl ComplianceStandardDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lookup(
        &self,
        data: &PrismaCloudProviderData,
        config: &DynamicValue,
    ) -> Result<Standard, ResourceError> {
        let api = &data.client.compliance().standards();
        resolve(
            lookup_key(config, "cs_id", "name")?,
            move |id: String| async move { api.get(&id).await },
            move |name: String| async move { api.identify(&name).await },
        )
        .await
    }
}

#[async_trait]
impl DataSource for ComplianceStandardDataSource {
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
                compliance_standard::schema(),
                "Looks up a compliance standard by ID or name",
                &["cs_id", "name"],
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
            "compliance standard",
            compliance_standard::save_compliance_standard,
        )
    }
}

#[async_trait]
impl DataSourceWithConfigure for ComplianceStandardDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[derive(Default)]
pub struct ComplianceStandardsDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl ComplianceStandardsDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn summary(standard: &Standard) -> Dynamic {
    listing_item([
        ("cs_id", Dynamic::from(standard.id.as_str())),
        ("name", Dynamic::from(standard.name.as_str())),
        ("description", Dynamic::from(standard.description.as_str())),
        ("cloud_types", string_slice_to_list(&standard.cloud_type)),
        ("system_default", Dynamic::from(standard.system_default)),
        (
            "policies_assigned_count",
            Dynamic::from(standard.policies_assigned_count),
        ),
        ("created_by", Dynamic::from(standard.created_by.as_str())),
        ("created_on", Dynamic::from(standard.created_on)),
        ("last_modified_by", Dynamic::from(standard.last_modified_by.as_str())),
        ("last_modified_on", Dynamic::from(standard.last_modified_on)),
    ])
}

#[async_trait]
impl DataSource for ComplianceStandardsDataSource {
    fn type_name(&self) -> &str {
        LIST_TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = listing_schema(
            "Lists all compliance standards",
            &[
                ("cs_id", AttributeType::String),
                ("name", AttributeType::String),
                ("description", AttributeType::String),
                ("cloud_types", AttributeType::list(AttributeType::String)),
                ("system_default", AttributeType::Bool),
                ("policies_assigned_count", AttributeType::Number),
                ("created_by", AttributeType::String),
                ("created_on", AttributeType::Number),
                ("last_modified_by", AttributeType::String),
                ("last_modified_on", AttributeType::Number),
            ],
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

        let result = data.client.compliance().standards().list().await;
        read_response(
            request.config,
            result,
            "compliance standards",
            |state, standards| save_listing(state, standards.iter().map(summary).collect()),
        )
    }
}

#[async_trait]
impl DataSourceWithConfigure for ComplianceStandardsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}
