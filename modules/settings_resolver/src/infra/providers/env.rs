//! Environment variable value provider

use crate::contract::{CfgError, Item, LoadedItem, SettingValue, ValueProvider, PATH_SEPARATOR};
use crate::domain::dispatcher::EventDispatcher;
use crate::domain::events::ProviderEvent;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Namespace prefix of derived variable names
pub const ENV_PREFIX: &str = "CFG";

/// Read access to an environment table
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The live process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed snapshot of variables
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// Variable name derived from an item name: `test1:settingOne` -> `CFG_TEST1_SETTING_ONE`
pub fn env_name(item_name: &str) -> String {
    let segments: Vec<String> = item_name
        .split(PATH_SEPARATOR)
        .map(upper_snake)
        .collect();
    format!("{}_{}", ENV_PREFIX, segments.join("_"))
}

/// `settingOne` -> `SETTING_ONE`; an underscore goes in at each lower-to-upper transition
fn upper_snake(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len() + 4);
    let mut prev_lower = false;
    for c in segment.chars() {
        if prev_lower && c.is_ascii_uppercase() {
            out.push('_');
        }
        prev_lower = c.is_ascii_lowercase();
        out.push(c.to_ascii_uppercase());
    }
    out
}

/// Resolves items from environment variables.
///
/// The lookup key is the item's `env_name` when set, otherwise the derived
/// name. Empty variables count as unset. Values are handed over as raw strings,
/// coercion happens in the tree.
pub struct EnvValueProvider {
    tag: Option<String>,
    source: Arc<dyn EnvSource>,
    events: EventDispatcher<ProviderEvent>,
}

impl EnvValueProvider {
    /// Provider backed by the process environment
    pub fn new() -> Self {
        Self::with_source(Arc::new(ProcessEnv))
    }

    pub fn with_source(source: Arc<dyn EnvSource>) -> Self {
        Self {
            tag: None,
            source,
            events: EventDispatcher::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    fn resolve(&self, item: Item) -> LoadedItem {
        let key = item
            .env_name
            .clone()
            .unwrap_or_else(|| env_name(&item.name));

        match self.source.var(&key).filter(|raw| !raw.is_empty()) {
            Some(raw) => {
                let provided = Item {
                    value: SettingValue::String(raw),
                    env_name: Some(key),
                    ..item.clone()
                };
                LoadedItem::provided(item, provided)
            }
            None => LoadedItem::missing(item),
        }
    }
}

impl Default for EnvValueProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ValueProvider for EnvValueProvider {
    fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    fn events(&self) -> &EventDispatcher<ProviderEvent> {
        &self.events
    }

    async fn load(&self, items: Vec<Item>) -> Result<(), CfgError> {
        let loaded: Vec<LoadedItem> = items.into_iter().map(|item| self.resolve(item)).collect();
        self.events.emit(ProviderEvent::loaded(loaded)).await
    }

    fn name(&self) -> &str {
        "env"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ValueType;
    use parking_lot::Mutex;

    fn item(name: &str, value: i32, env: Option<&str>) -> Item {
        Item {
            code: None,
            name: name.to_string(),
            default: SettingValue::from(1),
            value: SettingValue::from(value),
            env_name: env.map(str::to_string),
            tags: vec![],
            value_type: ValueType::Integer,
        }
    }

    #[test]
    fn test_env_name_derivation() {
        assert_eq!(env_name("test1:settingOne"), "CFG_TEST1_SETTING_ONE");
        assert_eq!(env_name("store:serviceVersion"), "CFG_STORE_SERVICE_VERSION");
        assert_eq!(env_name("top"), "CFG_TOP");
        assert_eq!(env_name("aBC:snake_case"), "CFG_A_BC_SNAKE_CASE");
        assert_eq!(env_name("http2Port"), "CFG_HTTP2PORT");
    }

    #[tokio::test]
    async fn test_load_emits_one_batch() {
        let source = MapEnv::new()
            .with("CFG_TEST1_SETTING_ONE", "1000")
            .with("CFG_TEST", "2000")
            .with("CFG_TEST1_SETTING_FOUR", "");
        let provider = EnvValueProvider::with_source(Arc::new(source));

        let batches = Arc::new(Mutex::new(Vec::new()));
        let b = batches.clone();
        provider.events().on_fn(move |event: ProviderEvent| {
            let batches = b.clone();
            async move {
                batches.lock().push(event.items().to_vec());
                Ok(())
            }
        });

        provider
            .load(vec![
                item("test1:settingOne", 3, None),
                item("test1:settingTwo", 5, None),
                item("test1:settingThree", 7, Some("CFG_TEST")),
                item("test1:settingFour", 9, None),
            ])
            .await
            .unwrap();

        let batches = batches.lock();
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];

        let first = batch[0].provided_item.as_ref().unwrap();
        assert_eq!(first.value, SettingValue::from("1000"));
        assert_eq!(first.env_name.as_deref(), Some("CFG_TEST1_SETTING_ONE"));
        assert_eq!(batch[0].requested_item.value, SettingValue::from(3));

        assert!(batch[1].provided_item.is_none());

        let third = batch[2].provided_item.as_ref().unwrap();
        assert_eq!(third.value, SettingValue::from("2000"));
        assert_eq!(third.env_name.as_deref(), Some("CFG_TEST"));

        assert!(batch[3].provided_item.is_none(), "empty variables count as unset");
    }

    #[test]
    fn test_map_env_from_iter() {
        let env: MapEnv = [("A", "1"), ("B", "2")].into_iter().collect();
        assert_eq!(env.var("A").as_deref(), Some("1"));
        assert_eq!(env.var("C"), None);
    }

    #[test]
    fn test_tag() {
        assert_eq!(EnvValueProvider::new().tag(), None);
        assert_eq!(EnvValueProvider::new().with_tag("env").tag(), Some("env"));
    }
}
