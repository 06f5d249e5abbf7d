//! Resource implementations
//!
//! Every resource follows the same lifecycle: `parse_*` turns the planned
//! state into an API struct, the API call runs, and `save_*` writes the
//! object read back from the API into state. Creates wait with the poller
//! until the new object is readable.

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
pub mod saved_search;
pub mod user_role;

pub use account_group::AccountGroupResource;
pub use alert_rule::AlertRuleResource;
pub use cloud_account::CloudAccountResource;
pub use compliance_standard::ComplianceStandardResource;
pub use compliance_standard_requirement::ComplianceStandardRequirementResource;
pub use compliance_standard_requirement_section::ComplianceStandardRequirementSectionResource;
pub use enterprise_settings::EnterpriseSettingsResource;
pub use integration::IntegrationResource;
pub use policy::PolicyResource;
pub use report::ReportResource;
pub use saved_search::SavedSearchResource;
pub use user_role::UserRoleResource;

use crate::api::{ApiError, TimeRange, TimeRangeValue};
use crate::poll::PollError;
use crate::util::{block_first, int_attr, single_block, string_attr, Attributes};
use crate::PrismaCloudProviderData;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceResponse,
    DeleteResourceResponse, ReadResourceResponse, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, NestedBlock, NestedBlockBuilder};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

/// Failure of a multi-step resource operation
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("object did not become readable: {0}")]
    Poll(#[from] PollError<ApiError>),

    #[error("{0}")]
    Invalid(String),
}

/// Extract our provider data from what the framework hands to `configure`
pub(crate) fn provider_data_from(
    data: Option<Arc<dyn Any + Send + Sync>>,
) -> Result<PrismaCloudProviderData, Diagnostic> {
    match data {
        Some(data) => data
            .downcast_ref::<PrismaCloudProviderData>()
            .cloned()
            .ok_or_else(|| {
                Diagnostic::error(
                    "Invalid provider data",
                    "Failed to extract PrismaCloudProviderData from provider data",
                )
            }),
        None => Err(Diagnostic::error(
            "No provider data",
            "No provider data was provided to the resource",
        )),
    }
}

pub(crate) fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}

pub(crate) fn error_diagnostic(summary: &str, err: &dyn std::fmt::Display) -> Diagnostic {
    Diagnostic::error(summary, err.to_string())
}

/// Store the provider data handed to a resource's `configure`
pub(crate) fn configure_resource(
    slot: &mut Option<PrismaCloudProviderData>,
    request: ConfigureResourceRequest,
) -> ConfigureResourceResponse {
    match provider_data_from(request.provider_data) {
        Ok(data) => {
            *slot = Some(data);
            ConfigureResourceResponse {
                diagnostics: vec![],
            }
        }
        Err(diag) => ConfigureResourceResponse {
            diagnostics: vec![diag],
        },
    }
}

/// A failed create still returns the state built so far, so an object that
/// was created but never became readable is tracked by its id
pub(crate) fn create_response(
    state: DynamicValue,
    result: Result<(), ResourceError>,
    kind: &str,
) -> CreateResourceResponse {
    let diagnostics = match result {
        Ok(()) => vec![],
        Err(e) => vec![error_diagnostic(&format!("Failed to create {}", kind), &e)],
    };
    CreateResourceResponse {
        new_state: state,
        diagnostics,
    }
}

/// Turn the result of a remote read into a read response
///
/// A missing object removes the resource from state.
pub(crate) fn read_response<T>(
    mut state: DynamicValue,
    result: Result<T, ApiError>,
    kind: &str,
    save: impl FnOnce(&mut DynamicValue, &T),
) -> ReadResourceResponse {
    match result {
        Ok(object) => {
            save(&mut state, &object);
            ReadResourceResponse {
                new_state: Some(state),
                diagnostics: vec![],
            }
        }
        Err(e) if e.is_not_found() => {
            tracing::info!("{} no longer exists, removing from state", kind);
            ReadResourceResponse {
                new_state: None,
                diagnostics: vec![],
            }
        }
        Err(e) => ReadResourceResponse {
            new_state: Some(state),
            diagnostics: vec![error_diagnostic(&format!("Failed to read {}", kind), &e)],
        },
    }
}

/// Deleting an object that is already gone succeeds
pub(crate) fn delete_response(result: Result<(), ApiError>, kind: &str) -> DeleteResourceResponse {
    match result {
        Ok(()) => DeleteResourceResponse {
            diagnostics: vec![],
        },
        Err(e) if e.is_not_found() => {
            tracing::debug!("{} was already deleted", kind);
            DeleteResourceResponse {
                diagnostics: vec![],
            }
        }
        Err(e) => DeleteResourceResponse {
            diagnostics: vec![error_diagnostic(&format!("Failed to delete {}", kind), &e)],
        },
    }
}

/// A failed update keeps the prior state
pub(crate) fn update_response<T, E: std::fmt::Display>(
    mut planned: DynamicValue,
    prior: DynamicValue,
    result: Result<T, E>,
    kind: &str,
    save: impl FnOnce(&mut DynamicValue, &T),
) -> UpdateResourceResponse {
    match result {
        Ok(object) => {
            save(&mut planned, &object);
            UpdateResourceResponse {
                new_state: planned,
                diagnostics: vec![],
            }
        }
        Err(e) => UpdateResourceResponse {
            new_state: prior,
            diagnostics: vec![error_diagnostic(&format!("Failed to update {}", kind), &e)],
        },
    }
}

pub(crate) const TIME_RANGE_TYPES: &[&str] = &["absolute", "relative", "to_now"];

/// Schema of a `time_range` block
pub(crate) fn time_range_block(min_items: i64) -> NestedBlock {
    NestedBlockBuilder::list("time_range")
        .description("Absolute range, relative range, or range up to now")
        .min_items(min_items)
        .max_items(1)
        .attribute(
            AttributeBuilder::string("type")
                .required()
                .validator(StringOneOfValidator::create(TIME_RANGE_TYPES))
                .build(),
        )
        .attribute(
            AttributeBuilder::number("amount")
                .description("Relative and to_now ranges: number of units")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::string("unit")
                .description("Relative and to_now ranges: minute, hour, day, week, month or year")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::number("start_time")
                .description("Absolute ranges: start in epoch milliseconds")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::number("end_time")
                .description("Absolute ranges: end in epoch milliseconds")
                .optional()
                .build(),
        )
        .build()
}

/// Read the `time_range` block; `None` when the block is absent
pub(crate) fn parse_time_range(src: &impl Attributes) -> Option<TimeRange> {
    let block = block_first(src, "time_range");
    if block.is_empty() {
        return None;
    }
    let non_zero = |name: &str| Some(int_attr(&block, name)).filter(|v| *v != 0);
    let unit = string_attr(&block, "unit");

    Some(TimeRange {
        range_type: string_attr(&block, "type"),
        value: TimeRangeValue {
            amount: non_zero("amount"),
            unit: (!unit.is_empty()).then_some(unit),
            start_time: non_zero("start_time"),
            end_time: non_zero("end_time"),
        },
    })
}

pub(crate) fn time_range_value(range: Option<&TimeRange>) -> Dynamic {
    let Some(range) = range else {
        return Dynamic::List(vec![]);
    };
    let number = |v: Option<i64>| v.map(Dynamic::from).unwrap_or(Dynamic::Null);

    let mut item = HashMap::new();
    item.insert("type".to_string(), Dynamic::from(range.range_type.as_str()));
    item.insert("amount".to_string(), number(range.value.amount));
    item.insert(
        "unit".to_string(),
        range
            .value
            .unit
            .as_deref()
            .map(Dynamic::from)
            .unwrap_or(Dynamic::Null),
    );
    item.insert("start_time".to_string(), number(range.value.start_time));
    item.insert("end_time".to_string(), number(range.value.end_time));
    single_block(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(entries: &[(&str, Dynamic)]) -> DynamicValue {
        let item: HashMap<String, Dynamic> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let mut value = DynamicValue::empty_object();
        value.set_attribute("time_range", single_block(item));
        value
    }

    #[test]
    fn relative_time_range_drops_unset_values() {
        let value = block(&[
            ("type", Dynamic::from("relative")),
            ("amount", Dynamic::from(24i64)),
            ("unit", Dynamic::from("hour")),
            ("start_time", Dynamic::Null),
            ("end_time", Dynamic::Null),
        ]);

        let range = parse_time_range(&value).expect("time range");
        assert_eq!(range.range_type, "relative");
        assert_eq!(range.value.amount, Some(24));
        assert_eq!(range.value.unit.as_deref(), Some("hour"));
        assert_eq!(range.value.start_time, None);

        assert_eq!(&time_range_value(Some(&range)), value.attribute("time_range"));
    }

    #[test]
    fn missing_time_range_is_none() {
        assert!(parse_time_range(&DynamicValue::empty_object()).is_none());
        assert_eq!(time_range_value(None), Dynamic::List(vec![]));
    }

    #[test]
    fn missing_object_on_read_clears_state() {
        let mut state = DynamicValue::empty_object();
        state.set_attribute("id", "gone");
        let result: Result<(), ApiError> = Err(ApiError::ObjectNotFound("x".to_string()));

        let response = read_response(state, result, "thing", |_, _| {});
        assert!(response.new_state.is_none());
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn missing_object_on_delete_succeeds() {
        let response = delete_response(Err(ApiError::ObjectNotFound("x".to_string())), "thing");
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn failed_update_keeps_prior_state() {
        let mut prior = DynamicValue::empty_object();
        prior.set_attribute("name", "old");
        let mut planned = DynamicValue::empty_object();
        planned.set_attribute("name", "new");

        let result: Result<(), ApiError> = Err(ApiError::ObjectNotFound("x".to_string()));
        let response = update_response(planned, prior, result, "thing", |_, _| {});
        assert_eq!(response.new_state.attribute("name").as_str(), Some("old"));
        assert_eq!(response.diagnostics.len(), 1);
    }
}
