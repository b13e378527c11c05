//! Common test utilities: scripted providers, a manual trigger and event recorders

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use settings_resolver::contract::{
    CfgError, Item, LoadedItem, SettingValue, TriggerState, ValueProvider, ValueProviderTrigger,
};
use settings_resolver::domain::{EventDispatcher, ProviderEvent, SettingsEvent, TriggerEvent};
use settings_resolver::Settings;
use std::sync::Arc;

pub fn print_test_header(test_name: &str, purpose: &[&str]) {
    println!("\n🧪 TEST: {}", test_name);
    if let Some(first) = purpose.first() {
        println!("📋 PURPOSE: {}", first);
    }
    for line in purpose.iter().skip(1) {
        println!("   {}", line);
    }
}

type Script = Box<dyn Fn(&[Item]) -> Vec<LoadedItem> + Send + Sync>;

/// Provider answering each batch with a fixed script and recording what it was asked
pub struct ScriptedProvider {
    name: String,
    tag: Option<String>,
    script: Script,
    events: EventDispatcher<ProviderEvent>,
    requests: Mutex<Vec<Vec<String>>>,
}

impl ScriptedProvider {
    pub fn new(
        name: &str,
        tag: Option<&str>,
        script: impl Fn(&[Item]) -> Vec<LoadedItem> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            tag: tag.map(str::to_string),
            script: Box::new(script),
            events: EventDispatcher::new(),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Provides `value` for the first requested item only, reports the rest as missing
    pub fn first_only(name: &str, tag: Option<&str>, value: SettingValue) -> Arc<Self> {
        Self::new(name, tag, move |items| {
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    if i == 0 {
                        LoadedItem::provided(item.clone(), item.with_value(value.clone()))
                    } else {
                        LoadedItem::missing(item.clone())
                    }
                })
                .collect()
        })
    }

    /// Provides `value` for the last requested item only
    pub fn last_only(name: &str, tag: Option<&str>, value: SettingValue) -> Arc<Self> {
        Self::new(name, tag, move |items| {
            let last = items.len().saturating_sub(1);
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    if i == last {
                        LoadedItem::provided(item.clone(), item.with_value(value.clone()))
                    } else {
                        LoadedItem::missing(item.clone())
                    }
                })
                .collect()
        })
    }

    /// Provides `value` for every requested item
    pub fn all(name: &str, tag: Option<&str>, value: SettingValue) -> Arc<Self> {
        Self::new(name, tag, move |items| {
            items
                .iter()
                .map(|item| LoadedItem::provided(item.clone(), item.with_value(value.clone())))
                .collect()
        })
    }

    /// Names requested in each batch, in call order
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().clone()
    }

    /// Push an out-of-band batch, the way a trigger-driven reload would
    pub async fn push(&self, loaded: Vec<LoadedItem>) -> Result<(), CfgError> {
        self.events.emit(ProviderEvent::refreshed(loaded)).await
    }
}

#[async_trait]
impl ValueProvider for ScriptedProvider {
    fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    fn events(&self) -> &EventDispatcher<ProviderEvent> {
        &self.events
    }

    async fn load(&self, items: Vec<Item>) -> Result<(), CfgError> {
        self.requests
            .lock()
            .push(items.iter().map(|i| i.name.clone()).collect());
        let loaded = (self.script)(&items);
        self.events.emit(ProviderEvent::loaded(loaded)).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Provider whose load fails without emitting
pub struct FailingProvider {
    events: EventDispatcher<ProviderEvent>,
}

impl FailingProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: EventDispatcher::new(),
        })
    }
}

#[async_trait]
impl ValueProvider for FailingProvider {
    fn tag(&self) -> Option<&str> {
        None
    }

    fn events(&self) -> &EventDispatcher<ProviderEvent> {
        &self.events
    }

    async fn load(&self, _items: Vec<Item>) -> Result<(), CfgError> {
        Err(CfgError::provider("failing", anyhow::anyhow!("backend unavailable")))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Provider that completes without ever dispatching `loaded`
pub struct SilentProvider {
    events: EventDispatcher<ProviderEvent>,
}

impl SilentProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: EventDispatcher::new(),
        })
    }
}

#[async_trait]
impl ValueProvider for SilentProvider {
    fn tag(&self) -> Option<&str> {
        None
    }

    fn events(&self) -> &EventDispatcher<ProviderEvent> {
        &self.events
    }

    async fn load(&self, _items: Vec<Item>) -> Result<(), CfgError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "silent"
    }
}

/// Trigger fired by hand
pub struct ManualTrigger {
    events: EventDispatcher<TriggerEvent>,
    state: Mutex<TriggerState>,
}

impl ManualTrigger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: EventDispatcher::new(),
            state: Mutex::new(TriggerState::Idle),
        })
    }

    pub async fn fire(&self) -> Result<(), CfgError> {
        self.events.emit(TriggerEvent::Update).await
    }
}

#[async_trait]
impl ValueProviderTrigger for ManualTrigger {
    fn events(&self) -> &EventDispatcher<TriggerEvent> {
        &self.events
    }

    async fn start(&self) -> Result<(), CfgError> {
        *self.state.lock() = TriggerState::Armed;
        Ok(())
    }

    async fn stop(&self) -> Result<(), CfgError> {
        *self.state.lock() = TriggerState::Idle;
        Ok(())
    }

    fn state(&self) -> TriggerState {
        *self.state.lock()
    }
}

/// Everything a settings tree announced, in dispatch order
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<SettingsEvent>>>,
}

impl EventRecorder {
    pub fn attach(settings: &Settings) -> Self {
        let recorder = Self::default();
        let events = recorder.events.clone();
        settings.events().on_fn(move |event: SettingsEvent| {
            let events = events.clone();
            async move {
                events.lock().push(event);
                Ok(())
            }
        });
        recorder
    }

    pub fn all(&self) -> Vec<SettingsEvent> {
        self.events.lock().clone()
    }

    pub fn sets(&self) -> Vec<Item> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SettingsEvent::Set(set) => Some(set.item.clone()),
                SettingsEvent::Changed(_) => None,
            })
            .collect()
    }

    /// `(item, previous value)` of every `changed` event
    pub fn changes(&self) -> Vec<(Item, SettingValue)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SettingsEvent::Changed(changed) => {
                    Some((changed.item.clone(), changed.previous.clone()))
                }
                SettingsEvent::Set(_) => None,
            })
            .collect()
    }
}
