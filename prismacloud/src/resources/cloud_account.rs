//! Cloud account resource implementation
//!
//! One resource covers every cloud. The configuration holds exactly one of
//! the `aws`, `azure`, `gcp` and `alibaba_cloud` blocks, and the resource
//! id joins the cloud type and the account id.

use super::{
    configure_resource, create_response, delete_response, not_configured, read_response,
    update_response, ResourceError,
};
use crate::api::cloud_account::{
    AccountBase, AlibabaAccount, AwsAccount, AzureAccount, CloudAccount, GcpAccount, TYPE_ALIBABA,
    TYPE_AWS, TYPE_AZURE, TYPE_GCP,
};
use crate::poll::poll_until_success;
use crate::util::{
    bool_attr, id_to_two_strings, resource_data_interface_map, set_or_null, single_block,
    string_attr, string_or_null, string_set_attr, two_strings_to_id, Attributes,
};
use crate::PrismaCloudProviderData;
use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, NestedBlock, NestedBlockBuilder, Schema, SchemaBuilder};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};

pub const TYPE_NAME: &str = "prismacloud_cloud_account";

const KIND: &str = "cloud account";

/// Block name for each cloud type
const CLOUD_BLOCKS: &[&str] = &[TYPE_AWS, TYPE_AZURE, TYPE_GCP, TYPE_ALIBABA];

#[derive(Default)]
pub struct CloudAccountResource {
    provider_data: Option<PrismaCloudProviderData>,
}

impl CloudAccountResource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn common_attributes(builder: NestedBlockBuilder) -> NestedBlockBuilder {
    builder
        .attribute(
            AttributeBuilder::string("account_id")
                .description("Cloud account ID")
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::string("name")
                .description("Name to be used for the account on the Prisma Cloud platform")
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::bool("enabled")
                .description("Whether the account is enabled")
                .default(StaticDefault::bool(true))
                .build(),
        )
        .attribute(
            AttributeBuilder::string_set("group_ids")
                .description("Account group IDs the account belongs to")
                .optional()
                .build(),
        )
}

fn aws_block() -> NestedBlock {
    common_attributes(NestedBlockBuilder::list(TYPE_AWS).max_items(1))
        .attribute(AttributeBuilder::string("external_id").required().build())
        .attribute(AttributeBuilder::string("role_arn").required().build())
        .attribute(
            AttributeBuilder::string("account_type")
                .default(StaticDefault::string("account"))
                .build(),
        )
        .attribute(
            AttributeBuilder::string("protection_mode")
                .optional()
                .computed()
                .build(),
        )
        .build()
}

fn azure_block() -> NestedBlock {
    common_attributes(NestedBlockBuilder::list(TYPE_AZURE).max_items(1))
        .attribute(AttributeBuilder::string("client_id").required().build())
        .attribute(
            AttributeBuilder::string("key")
                .description("Application key")
                .required()
                .sensitive()
                .build(),
        )
        .attribute(
            AttributeBuilder::bool("monitor_flow_logs")
                .default(StaticDefault::bool(false))
                .build(),
        )
        .attribute(AttributeBuilder::string("tenant_id").required().build())
        .attribute(AttributeBuilder::string("service_principal_id").required().build())
        .attribute(
            AttributeBuilder::string("account_type")
                .default(StaticDefault::string("account"))
                .build(),
        )
        .build()
}

fn gcp_block() -> NestedBlock {
    common_attributes(NestedBlockBuilder::list(TYPE_GCP).max_items(1))
        .attribute(
            AttributeBuilder::bool("compression_enabled")
                .default(StaticDefault::bool(false))
                .build(),
        )
        .attribute(
            AttributeBuilder::string("data_flow_enabled_project")
                .optional()
                .build(),
        )
        .attribute(AttributeBuilder::string("flow_log_storage_bucket").optional().build())
        .attribute(
            AttributeBuilder::string("credentials_json")
                .description("Contents of the service account key file")
                .required()
                .sensitive()
                .build(),
        )
        .attribute(
            AttributeBuilder::string("account_type")
                .default(StaticDefault::string("account"))
                .build(),
        )
        .build()
}

fn alibaba_block() -> NestedBlock {
    common_attributes(NestedBlockBuilder::list(TYPE_ALIBABA).max_items(1))
        .attribute(AttributeBuilder::string("ram_arn").required().build())
        .build()
}

pub fn schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Onboards a cloud account. Exactly one cloud block must be given.")
        .attribute(
            AttributeBuilder::string("id")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .block(aws_block())
        .block(azure_block())
        .block(gcp_block())
        .block(alibaba_block())
        .build()
}

/// Names of the cloud blocks present in `value`
fn configured_clouds(value: &DynamicValue) -> Vec<&'static str> {
    CLOUD_BLOCKS
        .iter()
        .copied()
        .filter(|name| {
            value
                .attribute(name)
                .as_list()
                .is_some_and(|items| !items.is_empty())
        })
        .collect()
}

fn parse_base(block: &impl Attributes) -> AccountBase {
    AccountBase {
        account_id: string_attr(block, "account_id"),
        enabled: bool_attr(block, "enabled"),
        group_ids: string_set_attr(block, "group_ids"),
        name: string_attr(block, "name"),
        account_type: string_attr(block, "account_type"),
    }
}

pub fn parse_cloud_account(value: &DynamicValue) -> Result<CloudAccount, ResourceError> {
    let clouds = configured_clouds(value);
    let [cloud] = clouds.as_slice() else {
        return Err(ResourceError::Invalid(format!(
            "exactly one of {} must be configured",
            CLOUD_BLOCKS.join(", ")
        )));
    };
    let block = resource_data_interface_map(value, cloud);

    let account = match *cloud {
        TYPE_AWS => CloudAccount::Aws(AwsAccount {
            account_id: string_attr(&block, "account_id"),
            enabled: bool_attr(&block, "enabled"),
            external_id: string_attr(&block, "external_id"),
            group_ids: string_set_attr(&block, "group_ids"),
            name: string_attr(&block, "name"),
            role_arn: string_attr(&block, "role_arn"),
            account_type: string_attr(&block, "account_type"),
            protection_mode: string_attr(&block, "protection_mode"),
        }),
        TYPE_AZURE => CloudAccount::Azure(AzureAccount {
            account: parse_base(&block),
            client_id: string_attr(&block, "client_id"),
            key: string_attr(&block, "key"),
            monitor_flow_logs: bool_attr(&block, "monitor_flow_logs"),
            tenant_id: string_attr(&block, "tenant_id"),
            service_principal_id: string_attr(&block, "service_principal_id"),
        }),
        TYPE_GCP => {
            let raw = string_attr(&block, "credentials_json");
            let credentials = serde_json::from_str(&raw).map_err(|e| {
                ResourceError::Invalid(format!("credentials_json is not valid JSON: {}", e))
            })?;
            CloudAccount::Gcp(GcpAccount {
                account: parse_base(&block),
                compression_enabled: bool_attr(&block, "compression_enabled"),
                data_flow_enabled_project: string_attr(&block, "data_flow_enabled_project"),
                flow_log_storage_bucket: string_attr(&block, "flow_log_storage_bucket"),
                credentials,
            })
        }
        _ => CloudAccount::Alibaba(AlibabaAccount {
            account_id: string_attr(&block, "account_id"),
            group_ids: string_set_attr(&block, "group_ids"),
            name: string_attr(&block, "name"),
            ram_arn: string_attr(&block, "ram_arn"),
            enabled: bool_attr(&block, "enabled"),
        }),
    };
    Ok(account)
}

fn base_fields(item: &mut HashMap<String, Dynamic>, base: &AccountBase) {
    item.insert("account_id".to_string(), Dynamic::from(base.account_id.as_str()));
    item.insert("name".to_string(), Dynamic::from(base.name.as_str()));
    item.insert("enabled".to_string(), Dynamic::from(base.enabled));
    item.insert("group_ids".to_string(), set_or_null(&base.group_ids));
}

/// The API never returns secrets, so they are carried over from state
fn kept_secret(prior: &HashMap<String, Dynamic>, name: &str) -> Dynamic {
    prior.get(name).cloned().unwrap_or(Dynamic::Null)
}

pub fn save_cloud_account(state: &mut DynamicValue, account: &CloudAccount) {
    let cloud = account.cloud_type();
    let prior = resource_data_interface_map(state, cloud);
    let mut item = HashMap::new();

    match account {
        CloudAccount::Aws(a) => {
            base_fields(
                &mut item,
                &AccountBase {
                    account_id: a.account_id.clone(),
                    enabled: a.enabled,
                    group_ids: a.group_ids.clone(),
                    name: a.name.clone(),
                    account_type: String::new(),
                },
            );
            item.insert("external_id".to_string(), Dynamic::from(a.external_id.as_str()));
            item.insert("role_arn".to_string(), Dynamic::from(a.role_arn.as_str()));
            item.insert("account_type".to_string(), Dynamic::from(a.account_type.as_str()));
            item.insert(
                "protection_mode".to_string(),
                Dynamic::from(a.protection_mode.as_str()),
            );
        }
        CloudAccount::Azure(a) => {
            base_fields(&mut item, &a.account);
            item.insert("client_id".to_string(), Dynamic::from(a.client_id.as_str()));
            item.insert("key".to_string(), kept_secret(&prior, "key"));
            item.insert("monitor_flow_logs".to_string(), Dynamic::from(a.monitor_flow_logs));
            item.insert("tenant_id".to_string(), Dynamic::from(a.tenant_id.as_str()));
            item.insert(
                "service_principal_id".to_string(),
                Dynamic::from(a.service_principal_id.as_str()),
            );
            item.insert(
                "account_type".to_string(),
                Dynamic::from(a.account.account_type.as_str()),
            );
        }
        CloudAccount::Gcp(a) => {
            base_fields(&mut item, &a.account);
            item.insert(
                "compression_enabled".to_string(),
                Dynamic::from(a.compression_enabled),
            );
            item.insert(
                "data_flow_enabled_project".to_string(),
                string_or_null(&a.data_flow_enabled_project),
            );
            item.insert(
                "flow_log_storage_bucket".to_string(),
                string_or_null(&a.flow_log_storage_bucket),
            );
            item.insert(
                "credentials_json".to_string(),
                kept_secret(&prior, "credentials_json"),
            );
            item.insert(
                "account_type".to_string(),
                Dynamic::from(a.account.account_type.as_str()),
            );
        }
        CloudAccount::Alibaba(a) => {
            base_fields(
                &mut item,
                &AccountBase {
                    account_id: a.account_id.clone(),
                    enabled: a.enabled,
                    group_ids: a.group_ids.clone(),
                    name: a.name.clone(),
                    account_type: String::new(),
                },
            );
            item.insert("ram_arn".to_string(), Dynamic::from(a.ram_arn.as_str()));
        }
    }

    state.set_attribute("id", two_strings_to_id(cloud, account.account_id()));
    for name in CLOUD_BLOCKS {
        if *name != cloud {
            state.set_attribute(name, Dynamic::List(vec![]));
        }
    }
    state.set_attribute(cloud, single_block(item));
}

impl CloudAccountResource {
    async fn create_cloud_account(
        &self,
        ctx: &Context,
        data: &PrismaCloudProviderData,
        state: &mut DynamicValue,
    ) -> Result<(), ResourceError> {
        let account = parse_cloud_account(state)?;
        let api = data.client.cloud_accounts();
        let cloud = account.cloud_type();
        let account_id = account.account_id().to_string();

        api.create(&account).await?;
        state.set_attribute("id", two_strings_to_id(cloud, &account_id));

        let created = poll_until_success(ctx, &data.poll, || api.get(cloud, &account_id)).await?;
        save_cloud_account(state, &created);
        Ok(())
    }
}

#[async_trait]
impl Resource for CloudAccountResource {
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

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];
        if configured_clouds(&request.config).len() != 1 {
            diagnostics.push(Diagnostic::error(
                "Invalid cloud account configuration",
                format!("Exactly one of {} must be configured", CLOUD_BLOCKS.join(", ")),
            ));
        }
        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut state = request.planned_state;
        let Some(data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: state,
                diagnostics: vec![not_configured()],
            };
        };

        let result = self.create_cloud_account(&ctx, data, &mut state).await;
        create_response(state, result, KIND)
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(data) = &self.provider_data else {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![not_configured()],
            };
        };

        let (cloud, account_id) = id_to_two_strings(&string_attr(&request.current_state, "id"));
        let result = data.client.cloud_accounts().get(&cloud, &account_id).await;
        read_response(request.current_state, result, KIND, save_cloud_account)
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![not_configured()],
            };
        };

        let api = data.client.cloud_accounts();
        let result = match parse_cloud_account(&request.planned_state) {
            Ok(account) => match api.update(&account).await {
                Ok(()) => api
                    .get(account.cloud_type(), account.account_id())
                    .await
                    .map_err(ResourceError::from),
                Err(e) => Err(e.into()),
            },
            Err(e) => Err(e),
        };
        update_response(
            request.planned_state,
            request.prior_state,
            result,
            KIND,
            save_cloud_account,
        )
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };

        let (cloud, account_id) = id_to_two_strings(&string_attr(&request.prior_state, "id"));
        delete_response(
            data.client.cloud_accounts().delete(&cloud, &account_id).await,
            KIND,
        )
    }
}

#[async_trait]
impl ResourceWithConfigure for CloudAccountResource {
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
    use crate::util::string_slice_to_set;

    fn azure_config() -> DynamicValue {
        let mut block = HashMap::new();
        block.insert("account_id".to_string(), Dynamic::from("sub-1"));
        block.insert("name".to_string(), Dynamic::from("prod"));
        block.insert("enabled".to_string(), Dynamic::from(true));
        block.insert(
            "group_ids".to_string(),
            string_slice_to_set(&["ag-1".to_string()]),
        );
        block.insert("client_id".to_string(), Dynamic::from("client"));
        block.insert("key".to_string(), Dynamic::from("s3cret"));
        block.insert("monitor_flow_logs".to_string(), Dynamic::from(false));
        block.insert("tenant_id".to_string(), Dynamic::from("tenant"));
        block.insert("service_principal_id".to_string(), Dynamic::from("sp"));
        block.insert("account_type".to_string(), Dynamic::from("account"));

        let mut value = DynamicValue::empty_object();
        value.set_attribute(TYPE_AWS, Dynamic::List(vec![]));
        value.set_attribute(TYPE_AZURE, single_block(block));
        value.set_attribute(TYPE_GCP, Dynamic::List(vec![]));
        value.set_attribute(TYPE_ALIBABA, Dynamic::List(vec![]));
        value
    }

    #[test]
    fn parse_picks_the_configured_cloud() {
        let account = parse_cloud_account(&azure_config()).unwrap();
        assert_eq!(account.cloud_type(), TYPE_AZURE);
        assert_eq!(account.account_id(), "sub-1");
        match account {
            CloudAccount::Azure(a) => assert_eq!(a.key, "s3cret"),
            other => panic!("expected azure account, got {:?}", other),
        }
    }

    #[test]
    fn parse_rejects_zero_or_two_clouds() {
        let mut none = azure_config();
        none.set_attribute(TYPE_AZURE, Dynamic::List(vec![]));
        assert!(parse_cloud_account(&none).is_err());

        let mut two = azure_config();
        let mut aws = HashMap::new();
        aws.insert("account_id".to_string(), Dynamic::from("123"));
        two.set_attribute(TYPE_AWS, single_block(aws));
        assert!(parse_cloud_account(&two).is_err());
    }

    #[test]
    fn save_keeps_secret_and_builds_composite_id() {
        let config = azure_config();
        let mut echoed = parse_cloud_account(&config).unwrap();
        if let CloudAccount::Azure(a) = &mut echoed {
            a.key.clear();
        }

        let mut state = config.clone();
        save_cloud_account(&mut state, &echoed);

        assert_eq!(state.attribute("id").as_str(), Some("azure.sub-1"));
        assert_eq!(state.attribute(TYPE_AZURE), config.attribute(TYPE_AZURE));
    }

    #[test]
    fn gcp_credentials_must_be_json() {
        let mut block = HashMap::new();
        block.insert("account_id".to_string(), Dynamic::from("proj"));
        block.insert("credentials_json".to_string(), Dynamic::from("not json"));
        let mut value = DynamicValue::empty_object();
        value.set_attribute(TYPE_GCP, single_block(block));

        assert!(matches!(
            parse_cloud_account(&value),
            Err(ResourceError::Invalid(_))
        ));
    }
}
