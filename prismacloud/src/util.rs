//! Conversions between Terraform values and plain Rust values
//!
//! The typed getters read "zero if unset": a null, unknown or mistyped
//! attribute yields the type's zero value instead of an error.

use std::collections::{BTreeSet, HashMap};
use tfplug::types::{Dynamic, DynamicValue};

/// Separator between the two halves of a composite id
pub const ID_SEPARATOR: &str = ".";

pub fn two_strings_to_id(a: &str, b: &str) -> String {
    format!("{}{}{}", a, ID_SEPARATOR, b)
}

/// Split at the first separator; an id without one decodes to `(id, "")`
pub fn id_to_two_strings(id: &str) -> (String, String) {
    match id.split_once(ID_SEPARATOR) {
        Some((a, b)) => (a.to_string(), b.to_string()),
        None => (id.to_string(), String::new()),
    }
}

pub fn list_to_string_slice(items: &[Dynamic]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item.as_str().map(str::to_string))
        .collect()
}

pub fn set_to_string_slice(items: &[Dynamic]) -> Vec<String> {
    list_to_string_slice(items)
}

/// Deduplicated and sorted, the order sets are stored in
pub fn string_slice_to_set(items: &[String]) -> Dynamic {
    let unique: BTreeSet<&String> = items.iter().collect();
    Dynamic::List(unique.into_iter().map(|s| Dynamic::from(s.as_str())).collect())
}

pub fn string_slice_to_list(items: &[String]) -> Dynamic {
    Dynamic::List(items.iter().map(|s| Dynamic::from(s.as_str())).collect())
}

/// The object behind a single-item nested block, or a map attribute itself
///
/// Absent, null, unknown and empty values all give an empty map.
pub fn resource_data_interface_map(value: &DynamicValue, key: &str) -> HashMap<String, Dynamic> {
    interface_map(value.attribute(key))
}

fn interface_map(value: &Dynamic) -> HashMap<String, Dynamic> {
    match value {
        Dynamic::List(items) => match items.first() {
            Some(Dynamic::Map(map)) => map.clone(),
            _ => HashMap::new(),
        },
        Dynamic::Map(map) => map.clone(),
        _ => HashMap::new(),
    }
}

/// Anything attributes can be read from: whole configurations, nested
/// block objects and plain maps
pub trait Attributes {
    fn attr(&self, name: &str) -> &Dynamic;
}

const NULL: &Dynamic = &Dynamic::Null;

impl Attributes for DynamicValue {
    fn attr(&self, name: &str) -> &Dynamic {
        self.attribute(name)
    }
}

impl Attributes for Dynamic {
    fn attr(&self, name: &str) -> &Dynamic {
        self.get(name).unwrap_or(NULL)
    }
}

impl Attributes for HashMap<String, Dynamic> {
    fn attr(&self, name: &str) -> &Dynamic {
        self.get(name).unwrap_or(NULL)
    }
}

pub fn string_attr(src: &impl Attributes, name: &str) -> String {
    src.attr(name).as_str().unwrap_or_default().to_string()
}

pub fn bool_attr(src: &impl Attributes, name: &str) -> bool {
    src.attr(name).as_bool().unwrap_or(false)
}

pub fn int_attr(src: &impl Attributes, name: &str) -> i64 {
    src.attr(name).as_i64().unwrap_or(0)
}

pub fn string_list_attr(src: &impl Attributes, name: &str) -> Vec<String> {
    src.attr(name)
        .as_list()
        .map(|items| list_to_string_slice(items))
        .unwrap_or_default()
}

pub fn string_set_attr(src: &impl Attributes, name: &str) -> Vec<String> {
    src.attr(name)
        .as_list()
        .map(|items| set_to_string_slice(items))
        .unwrap_or_default()
}

pub fn string_map_attr(src: &impl Attributes, name: &str) -> HashMap<String, String> {
    src.attr(name)
        .as_map()
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Objects of a list or set nested block
pub fn block_list(src: &impl Attributes, name: &str) -> Vec<HashMap<String, Dynamic>> {
    src.attr(name)
        .as_list()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_map().cloned())
                .collect()
        })
        .unwrap_or_default()
}

/// First object of a single-item nested block; empty when unset
pub fn block_first(src: &impl Attributes, name: &str) -> HashMap<String, Dynamic> {
    interface_map(src.attr(name))
}

/// Optional strings the API reports as "" are stored as null
pub fn string_or_null(value: &str) -> Dynamic {
    if value.is_empty() {
        Dynamic::Null
    } else {
        Dynamic::from(value)
    }
}

/// Optional sets the API reports as empty are stored as null
pub fn set_or_null(items: &[String]) -> Dynamic {
    if items.is_empty() {
        Dynamic::Null
    } else {
        string_slice_to_set(items)
    }
}

pub fn string_map_value(map: &HashMap<String, String>) -> Dynamic {
    Dynamic::Map(
        map.iter()
            .map(|(k, v)| (k.clone(), Dynamic::from(v.as_str())))
            .collect(),
    )
}

/// A nested block holding one object
pub fn single_block(object: HashMap<String, Dynamic>) -> Dynamic {
    Dynamic::List(vec![Dynamic::Map(object)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_id_round_trip() {
        assert_eq!(two_strings_to_id("aws", "123"), "aws.123");
        assert_eq!(
            id_to_two_strings("aws.123"),
            ("aws".to_string(), "123".to_string())
        );
    }

    #[test]
    fn composite_id_splits_at_first_separator() {
        assert_eq!(
            id_to_two_strings("cs.req.1"),
            ("cs".to_string(), "req.1".to_string())
        );
        assert_eq!(
            id_to_two_strings("plain"),
            ("plain".to_string(), String::new())
        );
    }

    #[test]
    fn list_conversion_drops_non_strings() {
        let items = vec![Dynamic::from("a"), Dynamic::Null, Dynamic::from("b")];
        assert_eq!(list_to_string_slice(&items), vec!["a", "b"]);
    }

    #[test]
    fn set_round_trip_is_set_equal() {
        let original = vec![Dynamic::from("b"), Dynamic::from("a"), Dynamic::from("b")];
        let set = string_slice_to_set(&set_to_string_slice(&original));
        assert_eq!(
            set,
            Dynamic::List(vec![Dynamic::from("a"), Dynamic::from("b")])
        );
    }

    #[test]
    fn interface_map_is_empty_for_missing_values() {
        let mut value = DynamicValue::empty_object();
        value.set_attribute("null_block", Dynamic::Null);
        value.set_attribute("unknown_block", Dynamic::Unknown);
        value.set_attribute("empty_block", Dynamic::List(vec![]));

        assert!(resource_data_interface_map(&value, "absent").is_empty());
        assert!(resource_data_interface_map(&value, "null_block").is_empty());
        assert!(resource_data_interface_map(&value, "unknown_block").is_empty());
        assert!(resource_data_interface_map(&value, "empty_block").is_empty());
        assert!(resource_data_interface_map(&DynamicValue::null(), "x").is_empty());
    }

    #[test]
    fn interface_map_reads_first_block_element() {
        let mut inner = HashMap::new();
        inner.insert("criteria".to_string(), Dynamic::from("config from x"));
        let mut value = DynamicValue::empty_object();
        value.set_attribute("rule", single_block(inner));

        let rule = resource_data_interface_map(&value, "rule");
        assert_eq!(string_attr(&rule, "criteria"), "config from x");
    }

    #[test]
    fn getters_fall_back_to_zero_values() {
        let mut value = DynamicValue::empty_object();
        value.set_attribute("name", "x");
        value.set_attribute("count", Dynamic::Unknown);

        assert_eq!(string_attr(&value, "name"), "x");
        assert_eq!(string_attr(&value, "missing"), "");
        assert_eq!(int_attr(&value, "count"), 0);
        assert!(!bool_attr(&value, "name"));
        assert!(string_list_attr(&value, "missing").is_empty());
        assert!(string_map_attr(&value, "missing").is_empty());
        assert!(block_list(&value, "missing").is_empty());
    }

    #[test]
    fn empty_values_become_null() {
        assert_eq!(string_or_null(""), Dynamic::Null);
        assert_eq!(string_or_null("x"), Dynamic::from("x"));
        assert_eq!(set_or_null(&[]), Dynamic::Null);
    }
}
