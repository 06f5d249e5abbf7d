//! Data source implementations
//!
//! Singular data sources reuse the schema of the matching resource with
//! every attribute computed except the lookup keys, and fill state with the
//! resource's `save_*` function. Plural data sources return `total` and a
//! `listing` of summaries.

pub mod account_group;
pub mod alert_rule;
pub mod cloud_account;
pub mod compliance_standard;
pub mod compliance_standard_requirement;
pub mod compliance_standard_requirement_section;
pub mod enterprise_settings;
pub mod integration;
pub mod policy;
pub mod report;
pub mod rql;
pub mod user_role;

pub use account_group::{AccountGroupDataSource, AccountGroupsDataSource};
pub use alert_rule::{AlertRuleDataSource, AlertRulesDataSource};
pub use cloud_account::{CloudAccountDataSource, CloudAccountsDataSource};
pub use compliance_standard::{ComplianceStandardDataSource, ComplianceStandardsDataSource};
pub use compliance_standard_requirement::{
    ComplianceStandardRequirementDataSource, ComplianceStandardRequirementsDataSource,
};
pub use compliance_standard_requirement_section::{
    ComplianceStandardRequirementSectionDataSource, ComplianceStandardRequirementSectionsDataSource,
};
pub use enterprise_settings::EnterpriseSettingsDataSource;
pub use integration::{IntegrationDataSource, IntegrationsDataSource};
pub use policy::{PoliciesDataSource, PolicyDataSource};
pub use report::{ReportDataSource, ReportsDataSource};
pub use rql::{RqlHistoricSearchDataSource, RqlHistoricSearchesDataSource, RqlSearchDataSource};
pub use user_role::{UserRoleDataSource, UserRolesDataSource};

use crate::api::ApiError;
use crate::resources::{error_diagnostic, not_configured, provider_data_from, ResourceError};
use crate::util::string_attr;
use crate::PrismaCloudProviderData;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, ReadDataSourceResponse,
};
use tfplug::schema::{
    Attribute, AttributeBuilder, AttributeType, Block, NestedBlock, NestingMode, Schema,
    SchemaBuilder,
};
use tfplug::types::{Dynamic, DynamicValue};

/// Store the provider data handed to a data source's `configure`
pub(crate) fn configure_data_source(
    slot: &mut Option<PrismaCloudProviderData>,
    request: ConfigureDataSourceRequest,
) -> ConfigureDataSourceResponse {
    match provider_data_from(request.provider_data) {
        Ok(data) => {
            *slot = Some(data);
            ConfigureDataSourceResponse {
                diagnostics: vec![],
            }
        }
        Err(diag) => ConfigureDataSourceResponse {
            diagnostics: vec![diag],
        },
    }
}

pub(crate) fn unconfigured(config: DynamicValue) -> ReadDataSourceResponse {
    ReadDataSourceResponse {
        state: config,
        diagnostics: vec![not_configured()],
    }
}

/// Derive a data source schema from a resource schema
///
/// Attributes named in `lookup` stay optional, everything else becomes
/// computed. Nested blocks turn into computed attributes of the equivalent
/// object type.
pub(crate) fn computed_schema(resource: Schema, description: &str, lookup: &[&str]) -> Schema {
    let mut attributes: Vec<Attribute> = resource
        .block
        .attributes
        .into_iter()
        .map(|attr| {
            let is_lookup = lookup.contains(&attr.name.as_str());
            computed_attribute(attr, is_lookup)
        })
        .collect();

    for nested in &resource.block.block_types {
        attributes.push(
            AttributeBuilder::new(&nested.type_name, nested_type(nested))
                .description(&nested.block.description)
                .computed()
                .build(),
        );
    }

    Schema {
        version: 0,
        block: Block {
            attributes,
            description: description.to_string(),
            ..Default::default()
        },
    }
}

fn computed_attribute(mut attr: Attribute, lookup: bool) -> Attribute {
    attr.required = false;
    attr.optional = lookup;
    attr.computed = true;
    attr.validators.clear();
    attr.plan_modifiers.clear();
    attr.default = None;
    attr
}

fn nested_type(nested: &NestedBlock) -> AttributeType {
    let mut fields: HashMap<String, AttributeType> = nested
        .block
        .attributes
        .iter()
        .map(|attr| (attr.name.clone(), attr.r#type.clone()))
        .collect();
    for inner in &nested.block.block_types {
        fields.insert(inner.type_name.clone(), nested_type(inner));
    }

    let object = AttributeType::Object(fields);
    match nested.nesting {
        NestingMode::Single => object,
        NestingMode::List => AttributeType::list(object),
        NestingMode::Set => AttributeType::set(object),
    }
}

/// Make an attribute of a derived schema required, e.g. a parent id
pub(crate) fn require(schema: &mut Schema, name: &str) {
    if let Some(attr) = schema
        .block
        .attributes
        .iter_mut()
        .find(|attr| attr.name == name)
    {
        attr.required = true;
        attr.optional = false;
        attr.computed = false;
    }
}

/// How a singular data source finds its object
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Lookup {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// The configured id and name; at least one must be set
pub(crate) fn lookup_key(
    config: &DynamicValue,
    id_attr: &str,
    name_attr: &str,
) -> Result<Lookup, ResourceError> {
    let non_empty = |attr: &str| Some(string_attr(config, attr)).filter(|v| !v.is_empty());
    let lookup = Lookup {
        id: non_empty(id_attr),
        name: non_empty(name_attr),
    };
    if lookup.id.is_none() && lookup.name.is_none() {
        return Err(ResourceError::Invalid(format!(
            "one of {} or {} must be set",
            id_attr, name_attr
        )));
    }
    Ok(lookup)
}

/// Fetch the object by id. When there is no id, or the id no longer exists
/// and a name is configured, the name is resolved with `identify` instead.
pub(crate) async fn resolve<T, G, GF, I, IF, E>(
    lookup: Lookup,
    get: G,
    identify: I,
) -> Result<T, ResourceError>
where
    G: Fn(String) -> GF,
    GF: Future<Output = Result<T, ApiError>>,
    I: FnOnce(String) -> IF,
    IF: Future<Output = Result<String, E>>,
    ResourceError: From<E>,
{
    let Lookup { id, name } = lookup;
    if let Some(id) = id {
        match get(id).await {
            Err(e) if e.is_not_found() && name.is_some() => {
                tracing::debug!("{}, looking up by name instead", e);
            }
            result => return Ok(result?),
        }
    }

    let name = name.ok_or_else(|| ResourceError::Invalid("no id or name to look up".to_string()))?;
    let id = identify(name).await?;
    Ok(get(id).await?)
}

/// Fill the data source state from a lookup result
pub(crate) fn read_response<T, E: Display>(
    mut state: DynamicValue,
    result: Result<T, E>,
    kind: &str,
    save: impl FnOnce(&mut DynamicValue, &T),
) -> ReadDataSourceResponse {
    match result {
        Ok(object) => {
            save(&mut state, &object);
            ReadDataSourceResponse {
                state,
                diagnostics: vec![],
            }
        }
        Err(e) => ReadDataSourceResponse {
            state,
            diagnostics: vec![error_diagnostic(&format!("Failed to read {}", kind), &e)],
        },
    }
}

/// Schema of a plural data source: `total` plus `listing` objects with the
/// given fields. Callers add their filter arguments to the returned builder.
pub(crate) fn listing_schema(description: &str, fields: &[(&str, AttributeType)]) -> SchemaBuilder {
    let object = AttributeType::Object(
        fields
            .iter()
            .map(|(name, ty)| (name.to_string(), ty.clone()))
            .collect(),
    );

    SchemaBuilder::new()
        .version(0)
        .description(description)
        .attribute(
            AttributeBuilder::number("total")
                .description("Number of items in the listing")
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("listing", AttributeType::list(object))
                .computed()
                .build(),
        )
}

pub(crate) fn save_listing(state: &mut DynamicValue, items: Vec<Dynamic>) {
    state.set_attribute("total", items.len() as i64);
    state.set_attribute("listing", Dynamic::List(items));
}

/// One object of a `listing`
pub(crate) fn listing_item<const N: usize>(fields: [(&str, Dynamic); N]) -> Dynamic {
    Dynamic::Map(
        fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{account_group, policy};

    #[test]
    fn derived_schema_keeps_only_lookup_keys_optional() {
        let schema = computed_schema(account_group::schema(), "", &["group_id", "name"]);

        for attr in &schema.block.attributes {
            assert!(!attr.required, "{}", attr.name);
            assert!(attr.computed, "{}", attr.name);
            assert!(attr.plan_modifiers.is_empty(), "{}", attr.name);
            let lookup = attr.name == "group_id" || attr.name == "name";
            assert_eq!(attr.optional, lookup, "{}", attr.name);
        }
    }

    #[test]
    fn nested_blocks_become_object_attributes() {
        let schema = computed_schema(policy::schema(), "", &["policy_id", "name"]);
        assert!(schema.block.block_types.is_empty());

        let rule = schema.block.attribute("rule").expect("rule attribute");
        let AttributeType::List(inner) = &rule.r#type else {
            panic!("rule should be a list, got {:?}", rule.r#type);
        };
        let AttributeType::Object(fields) = inner.as_ref() else {
            panic!("rule items should be objects");
        };
        assert_eq!(
            fields.get("parameters"),
            Some(&AttributeType::map(AttributeType::String))
        );

        let metadata = schema
            .block
            .attribute("compliance_metadata")
            .expect("compliance_metadata attribute");
        assert!(matches!(metadata.r#type, AttributeType::Set(_)));
    }

    #[test]
    fn lookup_collects_id_and_name() {
        let mut config = DynamicValue::empty_object();
        config.set_attribute("name", "prod");
        assert_eq!(
            lookup_key(&config, "group_id", "name").unwrap(),
            Lookup {
                id: None,
                name: Some("prod".to_string()),
            }
        );

        config.set_attribute("group_id", "ag-1");
        assert_eq!(
            lookup_key(&config, "group_id", "name").unwrap(),
            Lookup {
                id: Some("ag-1".to_string()),
                name: Some("prod".to_string()),
            }
        );

        assert!(lookup_key(&DynamicValue::empty_object(), "group_id", "name").is_err());
    }

    fn fake_get(id: String) -> impl Future<Output = Result<String, ApiError>> {
        async move {
            if id == "ag-2" {
                Ok(format!("group {}", id))
            } else {
                Err(ApiError::ObjectNotFound(format!("/cloud/group/{}", id)))
            }
        }
    }

    #[tokio::test]
    async fn stale_id_falls_back_to_name() {
        let lookup = Lookup {
            id: Some("stale".to_string()),
            name: Some("dev".to_string()),
        };
        let found = resolve(lookup, fake_get, |name: String| async move {
            assert_eq!(name, "dev");
            Ok::<_, ApiError>("ag-2".to_string())
        })
        .await
        .unwrap();
        assert_eq!(found, "group ag-2");
    }

    #[tokio::test]
    async fn stale_id_without_name_is_not_found() {
        let lookup = Lookup {
            id: Some("stale".to_string()),
            name: None,
        };
        let err = resolve(lookup, fake_get, |_: String| async {
            Ok::<_, ApiError>("never".to_string())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ResourceError::Api(ref e) if e.is_not_found()), "{err:?}");
    }

    #[test]
    fn listing_counts_items() {
        let mut state = DynamicValue::empty_object();
        save_listing(
            &mut state,
            vec![
                listing_item([("name", Dynamic::from("a"))]),
                listing_item([("name", Dynamic::from("b"))]),
            ],
        );
        assert_eq!(state.attribute("total").as_i64(), Some(2));
        assert_eq!(state.attribute("listing").as_list().map(Vec::len), Some(2));
    }
}
