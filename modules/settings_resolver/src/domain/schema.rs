//! Schema parsing
//!
//! A schema is a nested mapping. A node carrying a `default` key is a leaf
//! definition; every other mapping is a group whose key becomes a path segment.

use super::coercion::coerce;
use super::validation::validate_segment;
use crate::contract::{CfgError, Item, SettingValue, ValueType, PATH_SEPARATOR};
use serde::Deserialize;
use serde_json::{Map, Value};

const DEFAULT_KEY: &str = "default";

/// Author-supplied declaration of one leaf setting
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    pub default: SettingValue,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub env_name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Parsed schema: leaf definitions keyed by full path, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    definitions: Vec<(String, Definition)>,
}

impl Schema {
    pub fn parse(root: &Value) -> Result<Self, CfgError> {
        let map = root
            .as_object()
            .ok_or_else(|| CfgError::schema("", "schema root must be a mapping"))?;

        let mut definitions = Vec::new();
        collect(map, "", &mut definitions)?;
        Ok(Self { definitions })
    }

    pub fn from_json_str(text: &str) -> Result<Self, CfgError> {
        let root: Value = serde_json::from_str(text)
            .map_err(|e| CfgError::schema("", format!("invalid JSON: {}", e)))?;
        Self::parse(&root)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, CfgError> {
        let root: Value = serde_yaml::from_str(text)
            .map_err(|e| CfgError::schema("", format!("invalid YAML: {}", e)))?;
        Self::parse(&root)
    }

    pub fn definitions(&self) -> &[(String, Definition)] {
        &self.definitions
    }

    /// Build runtime items, coercing every default to its declared type
    pub fn into_items(self) -> Result<Vec<Item>, CfgError> {
        self.definitions
            .into_iter()
            .map(|(name, def)| {
                let default = coerce(&name, def.default, def.value_type).map_err(|e| {
                    CfgError::schema(&name, format!("default does not match its type: {}", e))
                })?;
                Ok(Item {
                    code: def.code,
                    name,
                    value: default.clone(),
                    default,
                    env_name: def.env_name,
                    tags: def.tags,
                    value_type: def.value_type,
                })
            })
            .collect()
    }
}

fn collect(
    node: &Map<String, Value>,
    prefix: &str,
    out: &mut Vec<(String, Definition)>,
) -> Result<(), CfgError> {
    for (key, child) in node {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}{}{}", prefix, PATH_SEPARATOR, key)
        };
        validate_segment(key, &path)?;

        match child {
            Value::Object(fields) if fields.contains_key(DEFAULT_KEY) => {
                let mut definition = Definition::deserialize(child)
                    .map_err(|e| CfgError::schema(&path, e.to_string()))?;
                dedup_tags(&mut definition.tags);
                out.push((path, definition));
            }
            Value::Object(fields) => collect(fields, &path, out)?,
            _ => {
                return Err(CfgError::schema(
                    &path,
                    "expected a definition or a group of definitions",
                ))
            }
        }
    }
    Ok(())
}

fn dedup_tags(tags: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    tags.retain(|tag| seen.insert(tag.clone()));
}
