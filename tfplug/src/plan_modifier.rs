//! Attribute plan modifiers
//!
//! Plan modifiers run during `PlanResourceChange` for updates, after the
//! framework has applied defaults and marked computed attributes unknown.

use crate::types::{AttributePath, Diagnostic, Dynamic};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PlanModifyRequest {
    pub state: Dynamic,
    pub plan: Dynamic,
    pub config: Dynamic,
    pub path: AttributePath,
}

#[derive(Debug, Clone)]
pub struct PlanModifyResponse {
    pub plan_value: Dynamic,
    pub requires_replace: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Modifies the planned value of one attribute
pub trait PlanModifier: Send + Sync {
    fn description(&self) -> String;

    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse;
}

/// Marks an attribute as requiring replacement when it changes
pub struct RequiresReplaceIfChanged;

impl RequiresReplaceIfChanged {
    pub fn create() -> Arc<dyn PlanModifier> {
        Arc::new(Self)
    }
}

impl PlanModifier for RequiresReplaceIfChanged {
    fn description(&self) -> String {
        "changing this attribute forces a new resource".to_string()
    }

    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        let requires_replace = !request.state.is_unknown()
            && !request.plan.is_unknown()
            && !values_equal(&request.state, &request.plan);

        PlanModifyResponse {
            plan_value: request.plan,
            requires_replace,
            diagnostics: Vec::new(),
        }
    }
}

/// Keeps the prior state value when the planned value is unknown
///
/// Use for computed attributes that never change once set, such as
/// server-assigned ids, so updates do not show them as "known after apply".
pub struct UseStateForUnknown;

impl UseStateForUnknown {
    pub fn create() -> Arc<dyn PlanModifier> {
        Arc::new(Self)
    }
}

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "once set, the value of this attribute in state will not change".to_string()
    }

    fn modify_plan(&self, request: PlanModifyRequest) -> PlanModifyResponse {
        let plan_value = if request.plan.is_unknown() && !request.state.is_null() {
            request.state
        } else {
            request.plan
        };

        PlanModifyResponse {
            plan_value,
            requires_replace: false,
            diagnostics: Vec::new(),
        }
    }
}

/// Structural equality; lists compare element by element
pub fn values_equal(a: &Dynamic, b: &Dynamic) -> bool {
    match (a, b) {
        (Dynamic::Null, Dynamic::Null) => true,
        (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
        (Dynamic::Number(a), Dynamic::Number(b)) => (a - b).abs() < f64::EPSILON,
        (Dynamic::String(a), Dynamic::String(b)) => a == b,
        (Dynamic::List(a), Dynamic::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Dynamic::Map(a), Dynamic::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|v2| values_equal(v, v2)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(state: Dynamic, plan: Dynamic) -> PlanModifyRequest {
        PlanModifyRequest {
            config: plan.clone(),
            state,
            plan,
            path: AttributePath::new("cloud_type"),
        }
    }

    #[test]
    fn requires_replace_if_changed_does_not_trigger_on_same_value() {
        let response = RequiresReplaceIfChanged
            .modify_plan(request(Dynamic::from("aws"), Dynamic::from("aws")));

        assert!(!response.requires_replace);
        assert_eq!(response.plan_value, Dynamic::from("aws"));
    }

    #[test]
    fn requires_replace_if_changed_triggers_on_change() {
        let response = RequiresReplaceIfChanged
            .modify_plan(request(Dynamic::from("aws"), Dynamic::from("gcp")));

        assert!(response.requires_replace);
    }

    #[test]
    fn requires_replace_ignores_unknown_plan() {
        let response =
            RequiresReplaceIfChanged.modify_plan(request(Dynamic::from("aws"), Dynamic::Unknown));

        assert!(!response.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_keeps_prior_value() {
        let response =
            UseStateForUnknown.modify_plan(request(Dynamic::from("id-1"), Dynamic::Unknown));
        assert_eq!(response.plan_value, Dynamic::from("id-1"));

        let response = UseStateForUnknown.modify_plan(request(Dynamic::Null, Dynamic::Unknown));
        assert!(response.plan_value.is_unknown());
    }

    #[test]
    fn values_equal_compares_nested_values() {
        let a = Dynamic::from(vec!["x", "y"]);
        let b = Dynamic::from(vec!["x", "y"]);
        let c = Dynamic::from(vec!["y", "x"]);

        assert!(values_equal(&a, &b));
        assert!(!values_equal(&a, &c));
    }
}
