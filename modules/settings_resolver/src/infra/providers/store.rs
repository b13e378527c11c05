//! Record-store value provider
//!
//! Items are matched to persisted records by their correlation `code`. Records
//! without a service version are shared by every version of the service; rows of
//! the configured version overlay them code by code.

use crate::config::StoreConfig;
use crate::contract::{CfgError, Item, LoadedItem, SettingValue, ValueProvider, ValueProviderTrigger};
use crate::domain::dispatcher::{EventDispatcher, Listener};
use crate::domain::events::{ProviderEvent, TriggerEvent};
use crate::domain::repository::{
    ConfigRecord, ConfigRecordRepository, NewConfigRecord, RecordFilter, StoredValue, VersionScope,
};
use crate::domain::validation::validate_item_codes;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

const PROVIDER_NAME: &str = "store";

/// Construction options of [`StoreValueProvider`]
#[derive(Clone, Default)]
pub struct StoreProviderOptions {
    pub tag: Option<String>,
    pub create_missing: bool,
    pub service_name: String,
    /// Empty for unversioned rows only
    pub service_version: String,
    pub trigger: Option<Arc<dyn ValueProviderTrigger>>,
}

impl StoreProviderOptions {
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            tag: None,
            create_missing: config.create_missing,
            service_name: config.service_name.clone(),
            service_version: config.service_version.clone(),
            trigger: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_trigger(mut self, trigger: Arc<dyn ValueProviderTrigger>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    fn version(&self) -> Option<&str> {
        Some(self.service_version.as_str()).filter(|v| !v.is_empty())
    }
}

/// Items of the last emitted batch and the newest change seen so far
#[derive(Default)]
struct ReloadState {
    handled: Vec<Item>,
    watermark: Option<DateTime<Utc>>,
}

struct StoreInner {
    options: StoreProviderOptions,
    repository: Arc<dyn ConfigRecordRepository>,
    events: EventDispatcher<ProviderEvent>,
    state: Mutex<ReloadState>,
}

/// Resolves items from a [`ConfigRecordRepository`], optionally re-resolving
/// them whenever its trigger fires.
pub struct StoreValueProvider {
    inner: Arc<StoreInner>,
}

impl StoreValueProvider {
    pub fn new(repository: Arc<dyn ConfigRecordRepository>, options: StoreProviderOptions) -> Self {
        let inner = Arc::new(StoreInner {
            options,
            repository,
            events: EventDispatcher::new(),
            state: Mutex::new(ReloadState::default()),
        });

        if let Some(trigger) = &inner.options.trigger {
            trigger.events().on(ReloadOnUpdate {
                inner: Arc::downgrade(&inner),
            });
        }

        Self { inner }
    }

    /// Items of the last emitted batch
    pub fn handled_items(&self) -> Vec<Item> {
        self.inner.state.lock().handled.clone()
    }

    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().watermark
    }

    pub fn trigger(&self) -> Option<&Arc<dyn ValueProviderTrigger>> {
        self.inner.options.trigger.as_ref()
    }
}

impl StoreInner {
    async fn find(&self, filter: &RecordFilter) -> Result<Vec<ConfigRecord>, CfgError> {
        self.repository
            .find(filter)
            .await
            .map_err(|e| CfgError::provider(PROVIDER_NAME, e))
    }

    /// Effective record per code: unversioned rows overlaid by the configured version
    async fn read_effective(
        &self,
        codes: Vec<String>,
        changed_after: Option<DateTime<Utc>>,
    ) -> Result<HashMap<String, ConfigRecord>, CfgError> {
        let mut filter = RecordFilter {
            service: self.options.service_name.clone(),
            version: VersionScope::Unversioned,
            codes: Some(codes),
            changed_after,
        };

        let mut records: HashMap<String, ConfigRecord> = self
            .find(&filter)
            .await?
            .into_iter()
            .map(|r| (r.code.clone(), r))
            .collect();

        if let Some(version) = self.options.version() {
            filter.version = VersionScope::Exactly(version.to_string());
            for record in self.find(&filter).await? {
                records.insert(record.code.clone(), record);
            }
        }

        Ok(records)
    }

    async fn create(&self, item: &Item, code: &str) -> Result<ConfigRecord, CfgError> {
        let record = self
            .repository
            .save(NewConfigRecord {
                service: self.options.service_name.clone(),
                service_version: self.options.version().map(str::to_string),
                code: code.to_string(),
                name: item.name.clone(),
                value: StoredValue {
                    value_type: item.value_type,
                    data: item.value.to_json(),
                },
                changes_check: Utc::now(),
            })
            .await
            .map_err(|e| CfgError::provider(PROVIDER_NAME, e))?;

        tracing::info!(
            service = %self.options.service_name,
            code = %record.code,
            name = %item.name,
            "Created missing config record"
        );
        Ok(record)
    }

    /// Regular load: every requested item with a record ends up in the batch
    async fn load_items(&self, items: Vec<Item>) -> Result<(), CfgError> {
        let codes: Vec<String> = items.iter().filter_map(|i| i.code.clone()).collect();
        let mut records = self.read_effective(codes, None).await?;

        if self.options.create_missing {
            for item in &items {
                let Some(code) = item.code.as_deref() else {
                    continue;
                };
                if !records.contains_key(code) {
                    let record = self.create(item, code).await?;
                    records.insert(record.code.clone(), record);
                }
            }
        }

        let loaded = pair_with_records(&items, &records);
        {
            let mut state = self.state.lock();
            state.handled = loaded.iter().map(|l| l.requested_item.clone()).collect();
            state.watermark = newest(state.watermark, records.values());
        }

        tracing::debug!(
            requested = items.len(),
            found = loaded.len(),
            "Store records read"
        );
        self.events.emit(ProviderEvent::loaded(loaded)).await
    }

    /// Trigger path: re-read only what changed since the watermark
    async fn reload_changed(&self) -> Result<(), CfgError> {
        let (handled, watermark) = {
            let state = self.state.lock();
            (state.handled.clone(), state.watermark)
        };
        if handled.is_empty() {
            return Ok(());
        }

        let codes: Vec<String> = handled.iter().filter_map(|i| i.code.clone()).collect();
        let changed = self.read_effective(codes, watermark).await?;
        if changed.is_empty() {
            tracing::debug!("No config records changed since last read");
            return Ok(());
        }

        // A changed unversioned row may still be shadowed by an unchanged versioned one
        let changed_codes: Vec<String> = changed.keys().cloned().collect();
        let current = self.read_effective(changed_codes, None).await?;

        let loaded = pair_with_records(&handled, &current);
        self.state.lock().watermark = newest(watermark, changed.values());

        tracing::debug!(changed = loaded.len(), "Reloading changed store records");
        self.events.emit(ProviderEvent::refreshed(loaded)).await
    }
}

fn pair_with_records(items: &[Item], records: &HashMap<String, ConfigRecord>) -> Vec<LoadedItem> {
    items
        .iter()
        .filter_map(|item| {
            let record = records.get(item.code.as_deref()?)?;
            let provided = Item {
                code: Some(record.code.clone()),
                value: SettingValue::from(record.value.data.clone()),
                ..item.clone()
            };
            Some(LoadedItem::provided(item.clone(), provided))
        })
        .collect()
}

fn newest<'a>(
    current: Option<DateTime<Utc>>,
    records: impl Iterator<Item = &'a ConfigRecord>,
) -> Option<DateTime<Utc>> {
    records.map(|r| r.changes_check).chain(current).max()
}

#[async_trait]
impl ValueProvider for StoreValueProvider {
    fn tag(&self) -> Option<&str> {
        self.inner.options.tag.as_deref()
    }

    fn events(&self) -> &EventDispatcher<ProviderEvent> {
        &self.inner.events
    }

    async fn load(&self, items: Vec<Item>) -> Result<(), CfgError> {
        let items: Vec<Item> = match self.tag() {
            Some(tag) => items.into_iter().filter(|i| i.has_tag(tag)).collect(),
            None => items,
        };
        validate_item_codes(&items)?;

        self.inner.load_items(items).await?;

        if let Some(trigger) = &self.inner.options.trigger {
            trigger.start().await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

/// Trigger listener re-resolving the provider's last handled items
struct ReloadOnUpdate {
    inner: Weak<StoreInner>,
}

#[async_trait]
impl Listener<TriggerEvent> for ReloadOnUpdate {
    async fn handle(&self, _event: &TriggerEvent) -> Result<(), CfgError> {
        match self.inner.upgrade() {
            Some(inner) => inner.reload_changed().await,
            None => Ok(()),
        }
    }
}
