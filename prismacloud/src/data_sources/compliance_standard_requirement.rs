//! Compliance standard requirement data sources

use super::{
    computed_schema, configure_data_source, listing_item, listing_schema, lookup_key,
    read_response, resolve, save_listing, unconfigured,
};
use crate::api::compliance::Requirement;
use crate::resources::{compliance_standard_requirement, ResourceError};
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

pub const TYPE_NAME: &str = "prismacloud_compliance_standard_requirement";
pub const LIST_TYPE_NAME: &str = "prismacloud_compliance_standard_requirements";

#[derive(Default)]
pub struct ComplianceStandardRequirementDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl ComplianceStandardRequirementDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looking up by name needs the standard the requirement belongs to
    async fn lookup(
        &self,
        data: &PrismaCloudProviderData,
        config: &DynamicValue,
    ) -> Result<Requirement, ResourceError> {
        let api = &data.client.compliance().requirements();
        let cs_id = string_attr(config, "cs_id");
        resolve(
            lookup_key(config, "csr_id", "name")?,
            move |id: String| async move { api.get(&id).await },
            move |name: String| async move {
                if cs_id.is_empty() {
                    return Err(ResourceError::Invalid(
                        "cs_id must be set to look up a requirement by name".to_string(),
                    ));
                }
                Ok(api.identify(&cs_id, &name).await?)
            },
        )
        .await
    }
}

#[async_trait]
impl DataSource for ComplianceStandardRequirementDataSource {
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
                compliance_standard_requirement::schema(),
                "Looks up a compliance requirement by ID, or by standard and name",
                &["cs_id", "csr_id", "name"],
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
            "compliance requirement",
            compliance_standard_requirement::save_requirement,
        )
    }
}

#[async_trait]
impl DataSourceWithConfigure for ComplianceStandardRequirementDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[derive(Default)]
pub struct ComplianceStandardRequirementsDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl ComplianceStandardRequirementsDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn summary(requirement: &Requirement) -> Dynamic {
    listing_item([
        ("csr_id", Dynamic::from(requirement.id.as_str())),
        ("name", Dynamic::from(requirement.name.as_str())),
        ("description", Dynamic::from(requirement.description.as_str())),
        (
            "requirement_id",
            Dynamic::from(requirement.requirement_id.as_str()),
        ),
        ("view_order", Dynamic::from(requirement.view_order)),
        ("system_default", Dynamic::from(requirement.system_default)),
        (
            "policies_assigned_count",
            Dynamic::from(requirement.policies_assigned_count),
        ),
        ("standard_name", Dynamic::from(requirement.standard_name.as_str())),
    ])
}

#[async_trait]
impl DataSource for ComplianceStandardRequirementsDataSource {
    fn type_name(&self) -> &str {
        LIST_TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = listing_schema(
            "Lists the requirements of a compliance standard",
            &[
                ("csr_id", AttributeType::String),
                ("name", AttributeType::String),
                ("description", AttributeType::String),
                ("requirement_id", AttributeType::String),
                ("view_order", AttributeType::Number),
                ("system_default", AttributeType::Bool),
                ("policies_assigned_count", AttributeType::Number),
                ("standard_name", AttributeType::String),
            ],
        )
        .attribute(
            AttributeBuilder::string("cs_id")
                .description("Compliance standard ID")
                .required()
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

        let cs_id = string_attr(&request.config, "cs_id");
        let result = data.client.compliance().requirements().list(&cs_id).await;
        read_response(
            request.config,
            result,
            "compliance requirements",
            |state, requirements| save_listing(state, requirements.iter().map(summary).collect()),
        )
    }
}

#[async_trait]
impl DataSourceWithConfigure for ComplianceStandardRequirementsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}
