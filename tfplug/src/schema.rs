//! Schema types and builders for tfplug
//!
//! This module provides the schema system for defining provider, resource and
//! data source schemas. Besides describing the shape to Terraform, the schema
//! drives the framework's validation, planning and state normalisation.

use crate::defaults::DefaultValue;
use crate::plan_modifier::{values_equal, PlanModifier, PlanModifyRequest};
use crate::proto;
use crate::types::{AttributePath, Diagnostic, Dynamic};
use crate::validator::Validator;
use std::collections::HashMap;
use std::sync::Arc;

/// AttributeType defines the type system for Terraform attributes
/// This must match Terraform's type system exactly
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number,
    Bool,
    List(Box<AttributeType>),
    Set(Box<AttributeType>),
    Map(Box<AttributeType>),
    Object(HashMap<String, AttributeType>),
}

impl AttributeType {
    pub fn list(element: AttributeType) -> Self {
        AttributeType::List(Box::new(element))
    }

    pub fn set(element: AttributeType) -> Self {
        AttributeType::Set(Box::new(element))
    }

    pub fn map(element: AttributeType) -> Self {
        AttributeType::Map(Box::new(element))
    }

    /// cty type constraint in its JSON form, e.g. `["list","string"]`
    pub fn to_cty_json(&self) -> serde_json::Value {
        use serde_json::json;

        match self {
            AttributeType::String => json!("string"),
            AttributeType::Number => json!("number"),
            AttributeType::Bool => json!("bool"),
            AttributeType::List(inner) => json!(["list", inner.to_cty_json()]),
            AttributeType::Set(inner) => json!(["set", inner.to_cty_json()]),
            AttributeType::Map(inner) => json!(["map", inner.to_cty_json()]),
            AttributeType::Object(fields) => {
                let fields: serde_json::Map<String, serde_json::Value> = fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.to_cty_json()))
                    .collect();
                json!(["object", fields])
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_cty_json().to_string().into_bytes()
    }

    /// Whether `value` conforms to this type; null and unknown always do
    pub fn accepts(&self, value: &Dynamic) -> bool {
        match (self, value) {
            (_, Dynamic::Null) | (_, Dynamic::Unknown) => true,
            (AttributeType::String, Dynamic::String(_)) => true,
            (AttributeType::Number, Dynamic::Number(_)) => true,
            (AttributeType::Bool, Dynamic::Bool(_)) => true,
            (AttributeType::List(inner), Dynamic::List(items))
            | (AttributeType::Set(inner), Dynamic::List(items)) => {
                items.iter().all(|item| inner.accepts(item))
            }
            (AttributeType::Map(inner), Dynamic::Map(items)) => {
                items.values().all(|item| inner.accepts(item))
            }
            (AttributeType::Object(fields), Dynamic::Map(items)) => items
                .iter()
                .all(|(name, item)| fields.get(name).is_some_and(|ty| ty.accepts(item))),
            _ => false,
        }
    }

    /// Fill object fields missing from `value` with null, recursively
    pub fn normalize(&self, value: &Dynamic) -> Dynamic {
        match (self, value) {
            (AttributeType::List(inner), Dynamic::List(items))
            | (AttributeType::Set(inner), Dynamic::List(items)) => {
                Dynamic::List(items.iter().map(|item| inner.normalize(item)).collect())
            }
            (AttributeType::Map(inner), Dynamic::Map(items)) => Dynamic::Map(
                items
                    .iter()
                    .map(|(k, v)| (k.clone(), inner.normalize(v)))
                    .collect(),
            ),
            (AttributeType::Object(fields), Dynamic::Map(items)) => Dynamic::Map(
                fields
                    .iter()
                    .map(|(name, ty)| {
                        let field = items.get(name).unwrap_or(&Dynamic::Null);
                        (name.clone(), ty.normalize(field))
                    })
                    .collect(),
            ),
            _ => value.clone(),
        }
    }
}

/// Schema is returned by providers/resources/data sources
/// Version is used for state migration
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

impl Schema {
    /// Shape `value` so that every attribute and block of the schema is present
    pub fn normalize(&self, value: &Dynamic) -> Dynamic {
        self.block.normalize(value)
    }

    pub fn to_proto(&self) -> proto::Schema {
        proto::Schema {
            version: self.version,
            block: Some(self.block.to_proto(self.version)),
        }
    }
}

/// Block represents a configuration block
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub attributes: Vec<Attribute>,
    pub block_types: Vec<NestedBlock>,
    pub description: String,
    pub description_kind: StringKind,
    pub deprecated: bool,
}

/// Attribute represents a single configuration attribute
#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub deprecated: bool,
    pub validators: Vec<Arc<dyn Validator>>,
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
    pub default: Option<Arc<dyn DefaultValue>>,
}

// Manual Debug implementation since validators/modifiers don't implement Debug
impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field("validators", &self.validators.len())
            .field("plan_modifiers", &self.plan_modifiers.len())
            .field("default", &self.default.is_some())
            .finish()
    }
}

/// NestedBlock represents a nested configuration block
#[derive(Debug, Clone)]
pub struct NestedBlock {
    pub type_name: String,
    pub block: Block,
    pub nesting: NestingMode,
    pub min_items: i64,
    /// Zero means unlimited
    pub max_items: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestingMode {
    Single,
    List,
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringKind {
    #[default]
    Plain,
    Markdown,
}

impl StringKind {
    fn to_proto(self) -> i32 {
        match self {
            StringKind::Plain => proto::StringKind::Plain as i32,
            StringKind::Markdown => proto::StringKind::Markdown as i32,
        }
    }
}

impl Block {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn normalize(&self, value: &Dynamic) -> Dynamic {
        let map = match value {
            Dynamic::Map(map) => map,
            Dynamic::Unknown => return Dynamic::Unknown,
            _ => return Dynamic::Null,
        };

        let mut out = HashMap::with_capacity(self.attributes.len() + self.block_types.len());
        for attr in &self.attributes {
            let v = map.get(&attr.name).unwrap_or(&Dynamic::Null);
            out.insert(attr.name.clone(), attr.r#type.normalize(v));
        }
        for nested in &self.block_types {
            let v = map.get(&nested.type_name).unwrap_or(&Dynamic::Null);
            let normalized = match (nested.nesting, v) {
                (_, Dynamic::Unknown) => Dynamic::Unknown,
                (NestingMode::Single, _) => nested.block.normalize(v),
                (_, Dynamic::List(items)) => Dynamic::List(
                    items
                        .iter()
                        .map(|item| nested.block.normalize(item))
                        .collect(),
                ),
                _ => Dynamic::List(Vec::new()),
            };
            out.insert(nested.type_name.clone(), normalized);
        }
        Dynamic::Map(out)
    }

    /// Check required attributes, value types, validators and block counts
    pub fn validate(&self, value: &Dynamic, path: &AttributePath, diags: &mut Vec<Diagnostic>) {
        let Dynamic::Map(map) = value else {
            return;
        };

        for attr in &self.attributes {
            let attr_path = path.clone().attribute(&attr.name);
            let v = map.get(&attr.name).unwrap_or(&Dynamic::Null);

            if attr.required && v.is_null() {
                diags.push(
                    Diagnostic::error(
                        "Missing required argument",
                        format!("The argument \"{}\" is required, but no definition was found.", attr_path),
                    )
                    .with_attribute(attr_path),
                );
                continue;
            }
            if !v.is_known() {
                continue;
            }
            if !attr.r#type.accepts(v) {
                diags.push(
                    Diagnostic::error(
                        "Incorrect attribute value type",
                        format!("Inappropriate value for attribute \"{}\": got {}.", attr_path, v.type_name()),
                    )
                    .with_attribute(attr_path),
                );
                continue;
            }
            for validator in &attr.validators {
                validator.validate(v, &attr_path, diags);
            }
        }

        for nested in &self.block_types {
            let block_path = path.clone().attribute(&nested.type_name);
            let v = map.get(&nested.type_name).unwrap_or(&Dynamic::Null);
            let items: Vec<&Dynamic> = match v {
                Dynamic::Unknown => continue,
                Dynamic::List(items) => items.iter().collect(),
                Dynamic::Map(_) => vec![v],
                _ => Vec::new(),
            };

            let count = items.len() as i64;
            if count < nested.min_items {
                diags.push(
                    Diagnostic::error(
                        format!("Insufficient {} blocks", nested.type_name),
                        format!("At least {} \"{}\" blocks are required.", nested.min_items, nested.type_name),
                    )
                    .with_attribute(block_path.clone()),
                );
            }
            if nested.max_items > 0 && count > nested.max_items {
                diags.push(
                    Diagnostic::error(
                        format!("Too many {} blocks", nested.type_name),
                        format!("No more than {} \"{}\" blocks are allowed.", nested.max_items, nested.type_name),
                    )
                    .with_attribute(block_path.clone()),
                );
            }

            for (i, item) in items.into_iter().enumerate() {
                let item_path = match nested.nesting {
                    NestingMode::Single => block_path.clone(),
                    _ => block_path.clone().index(i as i64),
                };
                nested.block.validate(item, &item_path, diags);
            }
        }
    }

    /// Compute the planned value from the proposed new state
    ///
    /// Optional attributes left null in `config` take their default. When the
    /// result differs from `prior`, computed attributes left null in `config`
    /// become unknown. For updates the attribute plan modifiers run last and
    /// report replacement paths into `requires_replace`.
    pub fn plan(
        &self,
        prior: &Dynamic,
        proposed: &Dynamic,
        config: &Dynamic,
        path: &AttributePath,
        requires_replace: &mut Vec<AttributePath>,
        diags: &mut Vec<Diagnostic>,
    ) -> Dynamic {
        let mut planned = self.normalize(proposed);
        self.apply_defaults(&mut planned, config);

        let prior = self.normalize(prior);
        if prior.is_null() || !values_equal(&prior, &planned) {
            self.mark_computed_unknown(&mut planned, config);
        }
        if !prior.is_null() {
            self.modify_plan(&prior, &mut planned, config, path, requires_replace, diags);
        }
        planned
    }

    fn apply_defaults(&self, planned: &mut Dynamic, config: &Dynamic) {
        let Dynamic::Map(map) = planned else {
            return;
        };

        for attr in &self.attributes {
            let Some(default) = &attr.default else {
                continue;
            };
            let configured = config.get(&attr.name).unwrap_or(&Dynamic::Null);
            if configured.is_null() {
                let path = AttributePath::new(&attr.name);
                map.insert(attr.name.clone(), default.default_value(&path));
            }
        }

        for nested in &self.block_types {
            let config_items = config.get(&nested.type_name);
            match map.get_mut(&nested.type_name) {
                Some(Dynamic::List(items)) => {
                    for (i, item) in items.iter_mut().enumerate() {
                        let item_config = config_items
                            .and_then(Dynamic::as_list)
                            .and_then(|l| l.get(i))
                            .unwrap_or(&Dynamic::Null);
                        nested.block.apply_defaults(item, item_config);
                    }
                }
                Some(single @ Dynamic::Map(_)) => {
                    nested
                        .block
                        .apply_defaults(single, config_items.unwrap_or(&Dynamic::Null));
                }
                _ => {}
            }
        }
    }

    fn mark_computed_unknown(&self, planned: &mut Dynamic, config: &Dynamic) {
        let Dynamic::Map(map) = planned else {
            return;
        };

        for attr in &self.attributes {
            if !attr.computed || attr.default.is_some() {
                continue;
            }
            let configured = config.get(&attr.name).unwrap_or(&Dynamic::Null);
            if configured.is_null() {
                map.insert(attr.name.clone(), Dynamic::Unknown);
            }
        }

        for nested in &self.block_types {
            let config_items = config.get(&nested.type_name);
            match map.get_mut(&nested.type_name) {
                Some(Dynamic::List(items)) => {
                    for (i, item) in items.iter_mut().enumerate() {
                        let item_config = config_items
                            .and_then(Dynamic::as_list)
                            .and_then(|l| l.get(i))
                            .unwrap_or(&Dynamic::Null);
                        nested.block.mark_computed_unknown(item, item_config);
                    }
                }
                Some(single @ Dynamic::Map(_)) => {
                    nested
                        .block
                        .mark_computed_unknown(single, config_items.unwrap_or(&Dynamic::Null));
                }
                _ => {}
            }
        }
    }

    fn modify_plan(
        &self,
        prior: &Dynamic,
        planned: &mut Dynamic,
        config: &Dynamic,
        path: &AttributePath,
        requires_replace: &mut Vec<AttributePath>,
        diags: &mut Vec<Diagnostic>,
    ) {
        let Dynamic::Map(map) = planned else {
            return;
        };

        for attr in &self.attributes {
            if attr.plan_modifiers.is_empty() {
                continue;
            }
            let attr_path = path.clone().attribute(&attr.name);
            let mut value = map.get(&attr.name).cloned().unwrap_or(Dynamic::Null);
            for modifier in &attr.plan_modifiers {
                let response = modifier.modify_plan(PlanModifyRequest {
                    state: prior.get(&attr.name).cloned().unwrap_or(Dynamic::Null),
                    plan: value,
                    config: config.get(&attr.name).cloned().unwrap_or(Dynamic::Null),
                    path: attr_path.clone(),
                });
                value = response.plan_value;
                diags.extend(response.diagnostics);
                if response.requires_replace && !requires_replace.contains(&attr_path) {
                    requires_replace.push(attr_path.clone());
                }
            }
            map.insert(attr.name.clone(), value);
        }

        for nested in &self.block_types {
            let block_path = path.clone().attribute(&nested.type_name);
            let prior_items = prior.get(&nested.type_name);
            let config_items = config.get(&nested.type_name);
            if let Some(Dynamic::List(items)) = map.get_mut(&nested.type_name) {
                for (i, item) in items.iter_mut().enumerate() {
                    let item_prior = prior_items
                        .and_then(Dynamic::as_list)
                        .and_then(|l| l.get(i))
                        .unwrap_or(&Dynamic::Null);
                    if item_prior.is_null() {
                        continue;
                    }
                    let item_config = config_items
                        .and_then(Dynamic::as_list)
                        .and_then(|l| l.get(i))
                        .unwrap_or(&Dynamic::Null);
                    nested.block.modify_plan(
                        item_prior,
                        item,
                        item_config,
                        &block_path.clone().index(i as i64),
                        requires_replace,
                        diags,
                    );
                }
            }
        }
    }

    fn to_proto(&self, version: i64) -> proto::schema::Block {
        proto::schema::Block {
            version,
            attributes: self.attributes.iter().map(Attribute::to_proto).collect(),
            block_types: self
                .block_types
                .iter()
                .map(|nested| proto::schema::NestedBlock {
                    type_name: nested.type_name.clone(),
                    block: Some(nested.block.to_proto(version)),
                    nesting: match nested.nesting {
                        NestingMode::Single => proto::schema::nested_block::NestingMode::Single,
                        NestingMode::List => proto::schema::nested_block::NestingMode::List,
                        NestingMode::Set => proto::schema::nested_block::NestingMode::Set,
                    } as i32,
                    min_items: nested.min_items,
                    max_items: nested.max_items,
                })
                .collect(),
            description: self.description.clone(),
            description_kind: self.description_kind.to_proto(),
            deprecated: self.deprecated,
        }
    }
}

impl Attribute {
    fn to_proto(&self) -> proto::schema::Attribute {
        proto::schema::Attribute {
            name: self.name.clone(),
            r#type: self.r#type.to_bytes(),
            nested_type: None,
            description: self.description.clone(),
            required: self.required,
            optional: self.optional,
            computed: self.computed,
            sensitive: self.sensitive,
            description_kind: StringKind::Plain.to_proto(),
            deprecated: self.deprecated,
            write_only: false,
        }
    }
}

/// AttributeBuilder provides fluent API for building attributes
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                deprecated: false,
                validators: Vec::new(),
                plan_modifiers: Vec::new(),
                default: None,
            },
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, AttributeType::String)
    }

    pub fn number(name: &str) -> Self {
        Self::new(name, AttributeType::Number)
    }

    pub fn bool(name: &str) -> Self {
        Self::new(name, AttributeType::Bool)
    }

    pub fn string_list(name: &str) -> Self {
        Self::new(name, AttributeType::list(AttributeType::String))
    }

    pub fn string_set(name: &str) -> Self {
        Self::new(name, AttributeType::set(AttributeType::String))
    }

    pub fn string_map(name: &str) -> Self {
        Self::new(name, AttributeType::map(AttributeType::String))
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.attribute.validators.push(validator);
        self
    }

    pub fn plan_modifier(mut self, modifier: Arc<dyn PlanModifier>) -> Self {
        self.attribute.plan_modifiers.push(modifier);
        self
    }

    /// Defaults imply optional + computed, as Terraform requires
    pub fn default(mut self, default: Arc<dyn DefaultValue>) -> Self {
        self.attribute.default = Some(default);
        self.attribute.optional = true;
        self.attribute.required = false;
        self.attribute.computed = true;
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// NestedBlockBuilder builds repeated or single nested blocks
pub struct NestedBlockBuilder {
    nested: NestedBlock,
}

impl NestedBlockBuilder {
    pub fn new(type_name: &str, nesting: NestingMode) -> Self {
        Self {
            nested: NestedBlock {
                type_name: type_name.to_string(),
                block: Block::default(),
                nesting,
                min_items: 0,
                max_items: 0,
            },
        }
    }

    pub fn list(type_name: &str) -> Self {
        Self::new(type_name, NestingMode::List)
    }

    pub fn set(type_name: &str) -> Self {
        Self::new(type_name, NestingMode::Set)
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.nested.block.description = desc.to_string();
        self
    }

    pub fn min_items(mut self, min: i64) -> Self {
        self.nested.min_items = min;
        self
    }

    pub fn max_items(mut self, max: i64) -> Self {
        self.nested.max_items = max;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.nested.block.attributes.push(attr);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.nested.block.block_types.push(block);
        self
    }

    pub fn build(self) -> NestedBlock {
        self.nested
    }
}

/// SchemaBuilder provides fluent API for building schemas
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block::default(),
            },
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.schema.block.block_types.push(block);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    pub fn description_kind(mut self, kind: StringKind) -> Self {
        self.schema.block.description_kind = kind;
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::StaticDefault;
    use crate::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};

    fn test_schema() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::string("id")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(AttributeBuilder::string("name").required().build())
            .attribute(
                AttributeBuilder::string("kind")
                    .required()
                    .plan_modifier(RequiresReplaceIfChanged::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::bool("enabled")
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .attribute(AttributeBuilder::number("last_modified").computed().build())
            .block(
                NestedBlockBuilder::list("rule")
                    .max_items(1)
                    .attribute(AttributeBuilder::string("criteria").required().build())
                    .attribute(AttributeBuilder::string("rule_type").optional().computed().build())
                    .build(),
            )
            .build()
    }

    fn object(pairs: &[(&str, Dynamic)]) -> Dynamic {
        Dynamic::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn attribute_builder_creates_required_string() {
        let attr = AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the resource")
            .required()
            .build();

        assert_eq!(attr.name, "name");
        assert!(matches!(attr.r#type, AttributeType::String));
        assert!(attr.required);
        assert!(!attr.optional);
        assert_eq!(attr.description, "The name of the resource");
    }

    #[test]
    fn cty_type_json() {
        assert_eq!(AttributeType::String.to_bytes(), br#""string""#.to_vec());
        assert_eq!(
            AttributeType::set(AttributeType::String).to_cty_json(),
            serde_json::json!(["set", "string"])
        );
        let object = AttributeType::Object(HashMap::from([(
            "port".to_string(),
            AttributeType::Number,
        )]));
        assert_eq!(
            object.to_cty_json(),
            serde_json::json!(["object", {"port": "number"}])
        );
    }

    #[test]
    fn normalize_fills_every_attribute_and_block() {
        let schema = test_schema();
        let normalized = schema.normalize(&object(&[("name", Dynamic::from("a")), ("extra", Dynamic::from(1))]));

        let map = normalized.as_map().unwrap();
        assert_eq!(map.len(), 6);
        assert!(map["id"].is_null());
        assert_eq!(map["rule"], Dynamic::List(vec![]));
        assert!(!map.contains_key("extra"));
        assert!(schema.normalize(&Dynamic::Null).is_null());
    }

    #[test]
    fn validate_reports_missing_required_and_block_counts() {
        let schema = test_schema();
        let rule = object(&[("criteria", Dynamic::from("x"))]);
        let config = object(&[
            ("kind", Dynamic::from("k")),
            ("rule", Dynamic::List(vec![rule.clone(), rule])),
        ]);

        let mut diags = Vec::new();
        schema.block.validate(&config, &AttributePath::root(), &mut diags);

        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].attribute, Some(AttributePath::new("name")));
        assert!(diags[1].summary.contains("Too many rule blocks"));
    }

    #[test]
    fn validate_skips_unknown_values() {
        let schema = test_schema();
        let config = object(&[("name", Dynamic::Unknown), ("kind", Dynamic::Unknown)]);

        let mut diags = Vec::new();
        schema.block.validate(&config, &AttributePath::root(), &mut diags);
        assert!(diags.is_empty());
    }

    #[test]
    fn plan_create_marks_computed_unknown_and_applies_defaults() {
        let schema = test_schema();
        let config = object(&[
            ("name", Dynamic::from("a")),
            ("kind", Dynamic::from("k")),
            ("rule", Dynamic::List(vec![object(&[("criteria", Dynamic::from("c"))])])),
        ]);

        let mut replace = Vec::new();
        let mut diags = Vec::new();
        let planned = schema.block.plan(
            &Dynamic::Null,
            &config,
            &config,
            &AttributePath::root(),
            &mut replace,
            &mut diags,
        );

        assert!(planned.get("id").unwrap().is_unknown());
        assert!(planned.get("last_modified").unwrap().is_unknown());
        assert_eq!(planned.get("enabled"), Some(&Dynamic::Bool(true)));
        let rule = &planned.get("rule").unwrap().as_list().unwrap()[0];
        assert!(rule.get("rule_type").unwrap().is_unknown());
        assert!(replace.is_empty());
    }

    #[test]
    fn plan_update_keeps_id_and_requests_replace() {
        let schema = test_schema();
        let prior = schema.normalize(&object(&[
            ("id", Dynamic::from("1")),
            ("name", Dynamic::from("a")),
            ("kind", Dynamic::from("k")),
            ("enabled", Dynamic::Bool(true)),
            ("last_modified", Dynamic::from(5)),
        ]));
        let config = object(&[("name", Dynamic::from("a")), ("kind", Dynamic::from("other"))]);
        let mut proposed = prior.clone();
        if let Dynamic::Map(map) = &mut proposed {
            map.insert("kind".to_string(), Dynamic::from("other"));
        }

        let mut replace = Vec::new();
        let mut diags = Vec::new();
        let planned = schema.block.plan(
            &prior,
            &proposed,
            &config,
            &AttributePath::root(),
            &mut replace,
            &mut diags,
        );

        assert_eq!(planned.get("id"), Some(&Dynamic::from("1")));
        assert!(planned.get("last_modified").unwrap().is_unknown());
        assert_eq!(replace, vec![AttributePath::new("kind")]);
    }

    #[test]
    fn plan_without_changes_keeps_computed_values() {
        let schema = test_schema();
        let prior = schema.normalize(&object(&[
            ("id", Dynamic::from("1")),
            ("name", Dynamic::from("a")),
            ("kind", Dynamic::from("k")),
            ("enabled", Dynamic::Bool(true)),
            ("last_modified", Dynamic::from(5)),
        ]));
        let config = object(&[("name", Dynamic::from("a")), ("kind", Dynamic::from("k"))]);

        let mut replace = Vec::new();
        let mut diags = Vec::new();
        let planned = schema.block.plan(
            &prior,
            &prior,
            &config,
            &AttributePath::root(),
            &mut replace,
            &mut diags,
        );

        assert_eq!(planned, prior);
        assert!(replace.is_empty());
    }

    #[test]
    fn schema_converts_to_proto() {
        let proto = test_schema().to_proto();
        let block = proto.block.unwrap();

        assert_eq!(block.attributes.len(), 5);
        assert_eq!(block.block_types.len(), 1);
        assert_eq!(block.block_types[0].max_items, 1);
        let enabled = block.attributes.iter().find(|a| a.name == "enabled").unwrap();
        assert!(enabled.optional && enabled.computed);
    }
}
