/// Events emitted by the settings tree, by value providers and by triggers
///
/// Each emitter has its own event type:
/// - Settings tree: `set` for every write, `changed` when the value differs
/// - Value provider: `loaded` with the outcome of a batch
/// - Trigger: `update`, asking providers to re-resolve

use crate::contract::{Item, LoadedItem, SettingValue};
use serde::Serialize;
use std::sync::Arc;

/// Change notifications of the settings tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SettingsEvent {
    /// A leaf was written, whether or not its value changed
    Set(SetEvent),
    /// A leaf was written with a value different from the previous one
    Changed(ChangedEvent),
}

/// Event data for a write
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetEvent {
    /// Snapshot of the item after the write
    pub item: Item,
}

/// Event data for a value change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangedEvent {
    /// Snapshot of the item after the write
    pub item: Item,
    /// Value held before the write
    pub previous: SettingValue,
}

impl SettingsEvent {
    pub fn set(item: Item) -> Self {
        SettingsEvent::Set(SetEvent { item })
    }

    pub fn changed(item: Item, previous: SettingValue) -> Self {
        SettingsEvent::Changed(ChangedEvent { item, previous })
    }

    /// Item snapshot carried by either variant
    pub fn item(&self) -> &Item {
        match self {
            SettingsEvent::Set(e) => &e.item,
            SettingsEvent::Changed(e) => &e.item,
        }
    }
}

/// Events of a value provider
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// Outcome of a batch requested through `load`; shared so each listener
    /// gets a cheap clone
    Loaded(Arc<Vec<LoadedItem>>),
    /// Values pushed outside of `load`, e.g. after a trigger fired
    Refreshed(Arc<Vec<LoadedItem>>),
}

impl ProviderEvent {
    pub fn loaded(items: Vec<LoadedItem>) -> Self {
        ProviderEvent::Loaded(Arc::new(items))
    }

    pub fn refreshed(items: Vec<LoadedItem>) -> Self {
        ProviderEvent::Refreshed(Arc::new(items))
    }

    /// True for the answer to a `load` request
    pub fn is_load_result(&self) -> bool {
        matches!(self, ProviderEvent::Loaded(_))
    }

    pub fn items(&self) -> &[LoadedItem] {
        match self {
            ProviderEvent::Loaded(items) | ProviderEvent::Refreshed(items) => items,
        }
    }
}

/// Events of a value provider trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    /// Previously handled items should be re-resolved
    Update,
}
