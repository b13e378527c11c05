//! Settings tree - typed hierarchy of settings built once from a schema
//!
//! Group nodes map a path segment to a child, leaf nodes own their item. Every
//! mutation goes through [`SettingsTree::set`] or [`SettingsTree::apply_provided`]
//! so that `set` / `changed` notifications are always dispatched.

use super::coercion::coerce;
use super::dispatcher::EventDispatcher;
use super::equality::deep_equal;
use super::events::SettingsEvent;
use super::schema::Schema;
use crate::contract::{CfgError, Item, SettingValue, PATH_SEPARATOR};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Item storage shared between a leaf node and the item index
type SharedItem = Arc<RwLock<Item>>;

/// One node of the settings tree
#[derive(Debug)]
pub enum SettingsNode {
    Group(IndexMap<String, SettingsNode>),
    Leaf(SharedItem),
}

impl SettingsNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, SettingsNode::Leaf(_))
    }

    /// Child of a group node
    pub fn child(&self, segment: &str) -> Option<&SettingsNode> {
        match self {
            SettingsNode::Group(children) => children.get(segment),
            SettingsNode::Leaf(_) => None,
        }
    }

    /// Segment names of a group node, in schema order
    pub fn keys(&self) -> Vec<&str> {
        match self {
            SettingsNode::Group(children) => children.keys().map(String::as_str).collect(),
            SettingsNode::Leaf(_) => Vec::new(),
        }
    }

    /// Current value of a leaf node
    pub fn value(&self) -> Option<SettingValue> {
        match self {
            SettingsNode::Leaf(item) => Some(item.read().value.clone()),
            SettingsNode::Group(_) => None,
        }
    }

    /// Snapshot of a leaf node's item
    pub fn item(&self) -> Option<Item> {
        match self {
            SettingsNode::Leaf(item) => Some(item.read().clone()),
            SettingsNode::Group(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SettingsNode::Leaf(item) => item.read().value.to_json(),
            SettingsNode::Group(children) => group_to_json(children),
        }
    }
}

fn group_to_json(children: &IndexMap<String, SettingsNode>) -> serde_json::Value {
    let map = children
        .iter()
        .map(|(key, node)| (key.clone(), node.to_json()))
        .collect::<serde_json::Map<_, _>>();
    serde_json::Value::Object(map)
}

/// Items partitioned by tag for one resolution pass
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TagGroups {
    /// Items without tags, offered to every provider
    pub untagged: Vec<String>,
    /// Item names per declared tag
    pub tagged: HashMap<String, Vec<String>>,
}

impl TagGroups {
    /// Untagged items followed by the items carrying `tag`
    pub fn candidates(&self, tag: Option<&str>) -> Vec<String> {
        let mut names = self.untagged.clone();
        if let Some(tagged) = tag.and_then(|t| self.tagged.get(t)) {
            names.extend(tagged.iter().cloned());
        }
        names
    }
}

/// Hierarchical settings container
pub struct SettingsTree {
    root: IndexMap<String, SettingsNode>,
    items: IndexMap<String, SharedItem>,
    events: EventDispatcher<SettingsEvent>,
}

impl SettingsTree {
    /// Build the tree from a parsed schema; values start at their coerced defaults
    pub fn from_schema(schema: Schema) -> Result<Self, CfgError> {
        let mut tree = Self {
            root: IndexMap::new(),
            items: IndexMap::new(),
            events: EventDispatcher::new(),
        };

        for item in schema.into_items()? {
            tree.insert(item)?;
        }
        Ok(tree)
    }

    fn insert(&mut self, item: Item) -> Result<(), CfgError> {
        let name = item.name.clone();
        let segments: Vec<&str> = name.split(PATH_SEPARATOR).collect();
        let Some((leaf_key, groups)) = segments.split_last() else {
            return Err(CfgError::schema(&name, "empty item name"));
        };

        let mut level = &mut self.root;
        for segment in groups {
            let node = level
                .entry((*segment).to_string())
                .or_insert_with(|| SettingsNode::Group(IndexMap::new()));
            level = match node {
                SettingsNode::Group(children) => children,
                SettingsNode::Leaf(_) => {
                    return Err(CfgError::schema(&name, "a setting cannot also be a group"))
                }
            };
        }

        if level.contains_key(*leaf_key) {
            return Err(CfgError::schema(&name, "duplicate setting"));
        }

        let shared = Arc::new(RwLock::new(item));
        level.insert((*leaf_key).to_string(), SettingsNode::Leaf(shared.clone()));
        self.items.insert(name, shared);
        Ok(())
    }

    pub fn events(&self) -> &EventDispatcher<SettingsEvent> {
        &self.events
    }

    /// Node at a colon-joined path; the empty path is not a node
    pub fn node(&self, path: &str) -> Option<&SettingsNode> {
        let mut segments = path.split(PATH_SEPARATOR);
        let first = segments.next()?;
        let mut node = self.root.get(first)?;
        for segment in segments {
            node = node.child(segment)?;
        }
        Some(node)
    }

    /// Current value of the leaf at `path`
    pub fn get(&self, path: &str) -> Result<SettingValue, CfgError> {
        self.leaf(path).map(|item| item.read().value.clone())
    }

    /// Snapshot of the item at `name`
    pub fn item(&self, name: &str) -> Option<Item> {
        self.items.get(name).map(|item| item.read().clone())
    }

    /// Snapshots of all items in schema order
    pub fn items(&self) -> Vec<Item> {
        self.items.values().map(|item| item.read().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Write a leaf as-is and notify.
    ///
    /// No coercion happens here. `set` is always dispatched, `changed` only when
    /// the value differs; returns once every listener has finished.
    pub async fn set(&self, path: &str, value: SettingValue) -> Result<(), CfgError> {
        let item = self.leaf(path)?;
        let (snapshot, previous) = {
            let mut guard = item.write();
            let previous = std::mem::replace(&mut guard.value, value);
            (guard.clone(), previous)
        };

        self.notify(snapshot, previous).await
    }

    /// Apply a provider-asserted item to the tracked item `name`.
    ///
    /// Provider metadata replaces the tracked one, the name is kept and the
    /// value is coerced to the declared type before it is stored. Unknown names
    /// are ignored and reported as `false`.
    pub async fn apply_provided(&self, name: &str, provided: &Item) -> Result<bool, CfgError> {
        let Some(item) = self.items.get(name) else {
            tracing::warn!(name, "Ignoring provided value for unknown setting");
            return Ok(false);
        };

        let value_type = item.read().value_type;
        let value = coerce(name, provided.value.clone(), value_type)?;

        let (snapshot, previous) = {
            let mut guard = item.write();
            guard.code = provided.code.clone();
            guard.env_name = provided.env_name.clone();
            guard.tags = provided.tags.clone();
            let previous = std::mem::replace(&mut guard.value, value);
            (guard.clone(), previous)
        };

        self.notify(snapshot, previous).await?;
        Ok(true)
    }

    /// Partition current items by tag
    pub fn group_by_tag(&self) -> TagGroups {
        let mut groups = TagGroups::default();
        for (name, item) in &self.items {
            let item = item.read();
            if item.tags.is_empty() {
                groups.untagged.push(name.clone());
            } else {
                for tag in &item.tags {
                    groups
                        .tagged
                        .entry(tag.clone())
                        .or_default()
                        .push(name.clone());
                }
            }
        }
        groups
    }

    /// Nested JSON projection of the tree
    pub fn to_json(&self) -> serde_json::Value {
        group_to_json(&self.root)
    }

    fn leaf(&self, path: &str) -> Result<&SharedItem, CfgError> {
        if let Some(item) = self.items.get(path) {
            return Ok(item);
        }
        match self.node(path) {
            Some(_) => Err(CfgError::NotALeaf {
                path: path.to_string(),
            }),
            None => Err(CfgError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    async fn notify(&self, item: Item, previous: SettingValue) -> Result<(), CfgError> {
        let changed = !deep_equal(&previous, &item.value);
        tracing::debug!(name = %item.name, changed, "Setting written");

        self.events.emit(SettingsEvent::set(item.clone())).await?;
        if changed {
            self.events
                .emit(SettingsEvent::changed(item, previous))
                .await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SettingsTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsTree")
            .field("items", &self.items.keys().collect::<Vec<_>>())
            .field("listeners", &self.events.listener_count())
            .finish()
    }
}
