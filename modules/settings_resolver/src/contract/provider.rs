//! Value provider and trigger traits
//!
//! Providers never return values directly: they announce the outcome of a batch
//! through their `loaded` event, which lets the same path serve both regular
//! loads and out-of-band reloads started by a trigger.

use super::{error::CfgError, model::Item};
use crate::domain::dispatcher::EventDispatcher;
use crate::domain::events::{ProviderEvent, TriggerEvent};
use async_trait::async_trait;

/// Pluggable source of setting values
#[async_trait]
pub trait ValueProvider: Send + Sync {
    /// Tag routing tagged items to this provider; untagged items are offered to every provider
    fn tag(&self) -> Option<&str>;

    /// Dispatcher for this provider's `loaded` event
    fn events(&self) -> &EventDispatcher<ProviderEvent>;

    /// Resolve a batch of items.
    ///
    /// Must dispatch `loaded` before (or while) the returned future completes.
    /// A `None` provided item, or no entry at all, means "no value here".
    async fn load(&self, items: Vec<Item>) -> Result<(), CfgError>;

    /// Name used in logs and errors
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Lifecycle state of a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Armed,
}

/// Push mechanism asking a provider to re-resolve the items it last handled
#[async_trait]
pub trait ValueProviderTrigger: Send + Sync {
    /// Dispatcher for this trigger's `update` event
    fn events(&self) -> &EventDispatcher<TriggerEvent>;

    /// Arm the trigger; no-op when already armed
    async fn start(&self) -> Result<(), CfgError>;

    /// Disarm the trigger. Once this returns no further `update` is dispatched.
    async fn stop(&self) -> Result<(), CfgError>;

    fn state(&self) -> TriggerState;
}
