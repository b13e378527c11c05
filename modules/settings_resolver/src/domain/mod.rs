//! Domain layer - settings tree, resolution engine and their building blocks

pub mod coercion;
pub mod dispatcher;
pub mod equality;
pub mod events;
pub mod repository;
pub mod schema;
pub mod service;
pub mod tree;
pub mod validation;

pub use dispatcher::{EventDispatcher, Listener, ListenerId};
pub use events::{ChangedEvent, ProviderEvent, SetEvent, SettingsEvent, TriggerEvent};
pub use repository::ConfigRecordRepository;
pub use schema::{Definition, Schema};
pub use service::Settings;
pub use tree::{SettingsNode, SettingsTree};
