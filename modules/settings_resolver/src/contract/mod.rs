//! Contract layer - public model and extension points
//!
//! This layer contains the item model, the error type and the traits value
//! providers and triggers implement.

pub mod error;
pub mod model;
pub mod provider;

pub use error::CfgError;
pub use model::{Item, LoadedItem, SettingValue, ValueType};
pub use provider::{TriggerState, ValueProvider, ValueProviderTrigger};

/// Separator between path segments in item names
pub const PATH_SEPARATOR: char = ':';
