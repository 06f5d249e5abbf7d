//! Compliance standard requirement section data sources

use super::{
    computed_schema, configure_data_source, listing_item, listing_schema, lookup_key,
    read_response, resolve, require, save_listing, unconfigured,
};
use crate::api::compliance::Section;
use crate::resources::{compliance_standard_requirement_section, ResourceError};
use crate::util::{string_attr, string_slice_to_list};
use crate::PrismaCloudProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema};
use tfplug::types::{Dynamic, DynamicValue};

pub const TYPE_NAME: &str = "prismacloud_compliance_standard_requirement_section";
pub const LIST_TYPE_NAME: &str = "prismacloud_compliance_standard_requirement_sections";

fn schema() -> Schema {
    let mut schema = computed_schema(
        compliance_standard_requirement_section::schema(),
        "Looks up a section of a compliance requirement by ID or section number",
        &["csrs_id", "section_id"],
    );
    require(&mut schema, "csr_id");
    schema
}

#[derive(Default)]
pub struct ComplianceStandardRequirementSectionDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl ComplianceStandardRequirementSectionDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lookup(
        &self,
        data: &PrismaCloudProviderData,
        config: &DynamicValue,
    ) -> Result<Section, ResourceError> {
        let api = &data.client.compliance().sections();
        let csr_id = string_attr(config, "csr_id");
        let csr_id = csr_id.as_str();
        resolve(
            lookup_key(config, "csrs_id", "section_id")?,
            move |id: String| async move { api.get(csr_id, &id).await },
            move |section_id: String| async move { api.identify(csr_id, &section_id).await },
        )
        .await
    }
}

#[async_trait]
impl DataSource for ComplianceStandardRequirementSectionDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: schema(),
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
            "compliance section",
            compliance_standard_requirement_section::save_section,
        )
    }
}

#[async_trait]
impl DataSourceWithConfigure for ComplianceStandardRequirementSectionDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[derive(Default)]
pub struct ComplianceStandardRequirementSectionsDataSource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl ComplianceStandardRequirementSectionsDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn summary(section: &Section) -> Dynamic {
    listing_item([
        ("csrs_id", Dynamic::from(section.id.as_str())),
        ("section_id", Dynamic::from(section.section_id.as_str())),
        ("description", Dynamic::from(section.description.as_str())),
        ("view_order", Dynamic::from(section.view_order)),
        ("label", Dynamic::from(section.label.as_str())),
        ("system_default", Dynamic::from(section.system_default)),
        (
            "policies_assigned_count",
            Dynamic::from(section.policies_assigned_count),
        ),
        (
            "associated_policy_ids",
            string_slice_to_list(&section.associated_policy_ids),
        ),
    ])
}

#[async_trait]
impl DataSource for ComplianceStandardRequirementSectionsDataSource {
    fn type_name(&self) -> &str {
        LIST_TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = listing_schema(
            "Lists the sections of a compliance requirement",
            &[
                ("csrs_id", AttributeType::String),
                ("section_id", AttributeType::String),
                ("description", AttributeType::String),
                ("view_order", AttributeType::Number),
                ("label", AttributeType::String),
                ("system_default", AttributeType::Bool),
                ("policies_assigned_count", AttributeType::Number),
                (
                    "associated_policy_ids",
                    AttributeType::list(AttributeType::String),
                ),
            ],
        )
        .attribute(
            AttributeBuilder::string("csr_id")
                .description("Compliance requirement ID")
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

        let csr_id = string_attr(&request.config, "csr_id");
        let result = data.client.compliance().sections().list(&csr_id).await;
        read_response(
            request.config,
            result,
            "compliance sections",
            |state, sections| save_listing(state, sections.iter().map(summary).collect()),
        )
    }
}

#[async_trait]
impl DataSourceWithConfigure for ComplianceStandardRequirementSectionsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}
