//! Resolution engine - drives an ordered list of providers against the settings tree

use super::dispatcher::{EventDispatcher, Listener};
use super::events::{ProviderEvent, SettingsEvent};
use super::schema::Schema;
use super::tree::{SettingsNode, SettingsTree};
use crate::contract::{CfgError, Item, SettingValue, ValueProvider};
use crate::infra::providers::env::EnvValueProvider;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Typed settings resolved from layered value providers
///
/// Clones share the same tree and the same provider bindings.
#[derive(Clone)]
pub struct Settings {
    /// Owner id of the apply-to-tree handler bound on every provider
    id: Uuid,
    tree: Arc<SettingsTree>,
}

impl Settings {
    /// Build settings at their defaults
    pub fn new(schema: Schema) -> Result<Self, CfgError> {
        Ok(Self {
            id: Uuid::new_v4(),
            tree: Arc::new(SettingsTree::from_schema(schema)?),
        })
    }

    pub fn from_json(schema: &serde_json::Value) -> Result<Self, CfgError> {
        Self::new(Schema::parse(schema)?)
    }

    /// Build settings and resolve them once from the process environment
    pub async fn init(schema: &serde_json::Value) -> Result<Self, CfgError> {
        let settings = Self::from_json(schema)?;
        let env: Arc<dyn ValueProvider> = Arc::new(EnvValueProvider::new());
        settings.load(&[env]).await?;
        Ok(settings)
    }

    pub fn tree(&self) -> &SettingsTree {
        &self.tree
    }

    /// `set` / `changed` notifications
    pub fn events(&self) -> &EventDispatcher<SettingsEvent> {
        self.tree.events()
    }

    pub fn get(&self, path: &str) -> Result<SettingValue, CfgError> {
        self.tree.get(path)
    }

    /// Deserialize the value at `path` into `T`
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T, CfgError> {
        let value = self.tree.get(path)?;
        serde_json::from_value(value.to_json()).map_err(|source| CfgError::Coercion {
            name: path.to_string(),
            source,
        })
    }

    pub fn node(&self, path: &str) -> Option<&SettingsNode> {
        self.tree.node(path)
    }

    pub fn items(&self) -> Vec<Item> {
        self.tree.items()
    }

    /// Write a leaf; completes once every listener has run
    pub async fn set(&self, path: &str, value: impl Into<SettingValue>) -> Result<(), CfgError> {
        self.tree.set(path, value.into()).await
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.tree.to_json()
    }

    /// Resolve every item through `providers`, in order.
    ///
    /// Each item is requested from providers until one supplies a value; later
    /// providers are never offered it during this call. Untagged items are
    /// offered to every provider, tagged items only to providers with a
    /// matching tag. A provider with nothing left to request is not called.
    /// The first provider failure aborts the call; values applied by earlier
    /// providers stay.
    ///
    /// Concurrent `load` calls on the same settings are not supported.
    pub async fn load(&self, providers: &[Arc<dyn ValueProvider>]) -> Result<(), CfgError> {
        let groups = self.tree.group_by_tag();
        let mut resolved: HashSet<String> = HashSet::with_capacity(self.tree.len());

        for provider in providers {
            provider.events().on_owned(
                self.id,
                Arc::new(ApplyToTree {
                    tree: Arc::downgrade(&self.tree),
                }),
            );

            let request: Vec<Item> = groups
                .candidates(provider.tag())
                .iter()
                .filter(|name| !resolved.contains(*name))
                .filter_map(|name| self.tree.item(name))
                .collect();

            if request.is_empty() {
                tracing::debug!(provider = provider.name(), "Nothing left to request, skipping provider");
                continue;
            }

            tracing::debug!(
                provider = provider.name(),
                requested = request.len(),
                "Requesting settings from provider"
            );
            let names = load_from(provider.as_ref(), request).await?;
            tracing::debug!(
                provider = provider.name(),
                resolved = names.len(),
                "Provider finished"
            );
            resolved.extend(names);
        }

        Ok(())
    }
}

/// Run one provider batch and return the names it resolved.
///
/// Only the first `loaded` dispatch of the batch counts. Refreshes pushed
/// while the batch is in flight still reach the tree through the persistent
/// handler but never count as resolutions of this call. The listener is
/// detached whatever the outcome.
async fn load_from(provider: &dyn ValueProvider, request: Vec<Item>) -> Result<Vec<String>, CfgError> {
    let outcome: Arc<Mutex<Option<Vec<String>>>> = Arc::new(Mutex::new(None));

    let slot = outcome.clone();
    let listener = provider.events().on_fn(move |event: ProviderEvent| {
        let slot = slot.clone();
        async move {
            if !event.is_load_result() {
                return Ok(());
            }
            slot.lock().get_or_insert_with(|| {
                event
                    .items()
                    .iter()
                    .filter(|loaded| loaded.provided_item.is_some())
                    .map(|loaded| loaded.requested_item.name.clone())
                    .collect()
            });
            Ok(())
        }
    });

    let result = provider.load(request).await;
    provider.events().off(listener);
    result?;

    let names = outcome.lock().take();
    names.ok_or_else(|| {
        CfgError::provider(
            provider.name(),
            anyhow::anyhow!("load completed without dispatching loaded"),
        )
    })
}

/// Persistent `loaded` handler: writes every provided value into the tree,
/// both for regular loads and for trigger-driven reloads.
struct ApplyToTree {
    tree: Weak<SettingsTree>,
}

#[async_trait]
impl Listener<ProviderEvent> for ApplyToTree {
    async fn handle(&self, event: &ProviderEvent) -> Result<(), CfgError> {
        let Some(tree) = self.tree.upgrade() else {
            return Ok(());
        };

        for loaded in event.items() {
            if let Some(provided) = &loaded.provided_item {
                tree.apply_provided(&loaded.requested_item.name, provided).await?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("id", &self.id)
            .field("tree", &self.tree)
            .finish()
    }
}
