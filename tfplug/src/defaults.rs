//! Default value providers for attributes
//!
//! Defaults are evaluated during planning for optional attributes whose
//! configured value is null. The planned value then carries the default so
//! `terraform plan` shows what will be sent to the API.

use crate::types::{AttributePath, Dynamic};
use std::sync::Arc;

pub trait DefaultValue: Send + Sync {
    fn description(&self) -> String;

    fn default_value(&self, path: &AttributePath) -> Dynamic;
}

/// StaticDefault provides a static default value
pub struct StaticDefault {
    value: Dynamic,
}

impl StaticDefault {
    pub fn create(value: Dynamic) -> Arc<dyn DefaultValue> {
        Arc::new(Self { value })
    }

    pub fn string(value: &str) -> Arc<dyn DefaultValue> {
        Self::create(Dynamic::String(value.to_string()))
    }

    pub fn number(value: f64) -> Arc<dyn DefaultValue> {
        Self::create(Dynamic::Number(value))
    }

    pub fn bool(value: bool) -> Arc<dyn DefaultValue> {
        Self::create(Dynamic::Bool(value))
    }
}

impl DefaultValue for StaticDefault {
    fn description(&self) -> String {
        format!("static default value: {:?}", self.value)
    }

    fn default_value(&self, _path: &AttributePath) -> Dynamic {
        self.value.clone()
    }
}
