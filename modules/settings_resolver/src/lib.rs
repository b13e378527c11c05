//! Settings Resolver
//!
//! Typed hierarchical settings built from a schema and resolved from an
//! ordered list of value providers. Items can be routed to providers by tag,
//! and providers with a trigger push later changes back into the tree.

// Public exports
pub mod contract;
pub use contract::{
    CfgError, Item, LoadedItem, SettingValue, TriggerState, ValueProvider, ValueProviderTrigger,
    ValueType,
};

pub mod config;
pub use config::{Config, StoreConfig, TriggerConfig};

pub mod domain;
pub use domain::{
    EventDispatcher, Listener, ListenerId, ProviderEvent, Schema, Settings, SettingsEvent,
    SettingsNode, TriggerEvent,
};

pub mod infra;
pub use infra::providers::{EnvValueProvider, MapEnv, StoreProviderOptions, StoreValueProvider};
pub use infra::storage::InMemoryConfigRecordRepository;
pub use infra::triggers::IntervalTrigger;
