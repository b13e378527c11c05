//! Integration tests for the record-store provider and trigger-driven reloads

mod common;
use common::{print_test_header, EventRecorder, ManualTrigger};

use async_trait::async_trait;
use serde_json::json;
use settings_resolver::contract::{
    CfgError, SettingValue, TriggerState, ValueProvider, ValueProviderTrigger, ValueType,
};
use settings_resolver::{
    Config, EnvValueProvider, InMemoryConfigRecordRepository, IntervalTrigger, MapEnv, Settings,
    StoreProviderOptions, StoreValueProvider,
};
use settings_resolver::domain::repository::{
    ConfigRecord, ConfigRecordRepository, NewConfigRecord, RecordFilter,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

const SERVICE: &str = "billing";

fn schema() -> serde_json::Value {
    json!({
        "limits": {
            "maxUsers": { "default": 10, "type": "integer", "code": "01H68DFKSC8KB4NJ319ST1R9B3", "tags": ["db"] },
            "quota": { "default": { "disk": 1 }, "type": "structured", "code": "01H68DFKSC8KB4NJ319ST1R9B4", "tags": ["db"] }
        },
        "server": {
            "port": { "default": 80, "type": "integer" }
        }
    })
}

fn options() -> StoreProviderOptions {
    StoreProviderOptions {
        create_missing: false,
        service_name: SERVICE.to_string(),
        ..Default::default()
    }
    .with_tag("db")
}

#[tokio::test]
async fn test_env_and_store_resolve_side_by_side() {
    print_test_header(
        "test_env_and_store_resolve_side_by_side",
        &[
            "Untagged items resolve from the environment",
            "Items tagged 'db' resolve from config records by code",
        ],
    );

    let repo = Arc::new(InMemoryConfigRecordRepository::new());
    repo.seed(SERVICE, None, "01H68DFKSC8KB4NJ319ST1R9B3", ValueType::Integer, json!(250));
    repo.seed(
        SERVICE,
        None,
        "01H68DFKSC8KB4NJ319ST1R9B4",
        ValueType::Structured,
        json!("{\"disk\": 20}"),
    );

    let settings = Settings::from_json(&schema()).unwrap();
    let providers: Vec<Arc<dyn ValueProvider>> = vec![
        Arc::new(EnvValueProvider::with_source(Arc::new(
            MapEnv::new().with("CFG_SERVER_PORT", "8080"),
        ))),
        Arc::new(StoreValueProvider::new(repo, options())),
    ];

    settings.load(&providers).await.unwrap();

    assert_eq!(settings.get("server:port").unwrap(), SettingValue::from(8080));
    assert_eq!(settings.get("limits:maxUsers").unwrap(), SettingValue::from(250));
    assert_eq!(settings.to_json()["limits"]["quota"], json!({ "disk": 20 }));
}

#[tokio::test]
async fn test_store_creates_missing_records() {
    let repo = Arc::new(InMemoryConfigRecordRepository::new());
    let settings = Settings::from_json(&schema()).unwrap();
    let provider = StoreValueProvider::new(
        repo.clone(),
        StoreProviderOptions {
            create_missing: true,
            service_version: "2.1.0".to_string(),
            ..options()
        },
    );
    let providers: Vec<Arc<dyn ValueProvider>> = vec![Arc::new(provider)];

    settings.load(&providers).await.unwrap();

    let records = repo.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.service == SERVICE));
    assert!(records
        .iter()
        .all(|r| r.service_version.as_deref() == Some("2.1.0")));
    assert_eq!(records[0].value.data, json!(10));
    assert_eq!(records[1].value.data, json!({ "disk": 1 }));
    assert_eq!(settings.get("limits:maxUsers").unwrap(), SettingValue::from(10));
}

#[tokio::test]
async fn test_store_rejects_items_without_code() {
    let settings = Settings::from_json(&json!({
        "limits": { "maxUsers": { "default": 10, "type": "integer", "tags": ["db"] } }
    }))
    .unwrap();
    let recorder = EventRecorder::attach(&settings);
    let providers: Vec<Arc<dyn ValueProvider>> = vec![Arc::new(StoreValueProvider::new(
        Arc::new(InMemoryConfigRecordRepository::new()),
        options(),
    ))];

    let result = settings.load(&providers).await;

    assert!(matches!(result, Err(CfgError::Validation { .. })));
    assert!(recorder.all().is_empty());
}

#[tokio::test]
async fn test_trigger_pushes_changed_records_into_tree() {
    print_test_header(
        "test_trigger_pushes_changed_records_into_tree",
        &[
            "Load arms the trigger",
            "Each update re-reads records changed since the last read",
            "The change reaches the tree through the same apply handler",
        ],
    );

    let repo = Arc::new(InMemoryConfigRecordRepository::new());
    repo.seed(SERVICE, None, "01H68DFKSC8KB4NJ319ST1R9B3", ValueType::Integer, json!(250));
    repo.seed(SERVICE, None, "01H68DFKSC8KB4NJ319ST1R9B4", ValueType::Structured, json!({}));

    let trigger = ManualTrigger::new();
    let settings = Settings::from_json(&schema()).unwrap();
    let providers: Vec<Arc<dyn ValueProvider>> = vec![Arc::new(StoreValueProvider::new(
        repo.clone(),
        options().with_trigger(trigger.clone()),
    ))];

    settings.load(&providers).await.unwrap();
    assert_eq!(trigger.state(), TriggerState::Armed);

    let recorder = EventRecorder::attach(&settings);
    trigger.fire().await.unwrap();
    assert!(recorder.all().is_empty(), "nothing changed yet");

    assert!(repo.update(SERVICE, None, "01H68DFKSC8KB4NJ319ST1R9B3", json!("300")));
    trigger.fire().await.unwrap();

    assert_eq!(settings.get("limits:maxUsers").unwrap(), SettingValue::from(300));
    let changes = recorder.changes();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].0.name, "limits:maxUsers");
    assert_eq!(changes[0].1, SettingValue::from(250));
}

#[tokio::test(start_paused = true)]
async fn test_interval_trigger_drives_store_reload() {
    let repo = Arc::new(InMemoryConfigRecordRepository::new());
    repo.seed(SERVICE, None, "01H68DFKSC8KB4NJ319ST1R9B3", ValueType::Integer, json!(1));
    repo.seed(SERVICE, None, "01H68DFKSC8KB4NJ319ST1R9B4", ValueType::Structured, json!({}));

    let trigger = Arc::new(IntervalTrigger::new(Duration::from_secs(30)));
    let settings = Settings::from_json(&schema()).unwrap();
    let providers: Vec<Arc<dyn ValueProvider>> = vec![Arc::new(StoreValueProvider::new(
        repo.clone(),
        options().with_trigger(trigger.clone()),
    ))];
    settings.load(&providers).await.unwrap();

    repo.update(SERVICE, None, "01H68DFKSC8KB4NJ319ST1R9B3", json!(2));
    assert_eq!(settings.get("limits:maxUsers").unwrap(), SettingValue::from(1));

    tokio::time::advance(Duration::from_secs(30)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(settings.get("limits:maxUsers").unwrap(), SettingValue::from(2));

    trigger.stop().await.unwrap();
    repo.update(SERVICE, None, "01H68DFKSC8KB4NJ319ST1R9B3", json!(3));
    tokio::time::advance(Duration::from_secs(60)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(settings.get("limits:maxUsers").unwrap(), SettingValue::from(2));
}

#[tokio::test]
async fn test_config_feeds_store_options() {
    let env = MapEnv::new()
        .with("SERVICE_NAME", SERVICE)
        .with("CFG_STORE_CREATE_MISSING", "false")
        .with("CFG_TRIGGER_INTERVAL", "0.5");
    let config = Config::load_with(Arc::new(EnvValueProvider::with_source(Arc::new(env))))
        .await
        .unwrap();

    let options = StoreProviderOptions::from_config(&config.store);
    assert_eq!(options.service_name, SERVICE);
    assert!(!options.create_missing);

    let trigger = IntervalTrigger::from_config(&config.trigger);
    assert_eq!(trigger.interval(), Duration::from_millis(500));
}

/// Repository that can hold its next `find` until released
struct GatedRepository {
    inner: Arc<InMemoryConfigRecordRepository>,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedRepository {
    fn new(inner: Arc<InMemoryConfigRecordRepository>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            armed: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
        })
    }

    fn hold_next_find(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConfigRecordRepository for GatedRepository {
    async fn find(&self, filter: &RecordFilter) -> anyhow::Result<Vec<ConfigRecord>> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.find(filter).await
    }

    async fn save(&self, record: NewConfigRecord) -> anyhow::Result<ConfigRecord> {
        self.inner.save(record).await
    }
}

#[tokio::test]
async fn test_refresh_during_load_does_not_count_as_resolution() {
    print_test_header(
        "test_refresh_during_load_does_not_count_as_resolution",
        &[
            "A trigger refresh lands while the store is still reading a load batch",
            "Only the batch answering the load decides what later providers are offered",
        ],
    );

    let records = Arc::new(InMemoryConfigRecordRepository::new());
    records.seed(SERVICE, None, "A", ValueType::String, json!("store-a"));
    records.seed(SERVICE, None, "B", ValueType::String, json!("store-b"));
    let repo = GatedRepository::new(records.clone());

    let trigger = ManualTrigger::new();
    let settings = Settings::from_json(&json!({
        "a": { "default": "unset", "type": "string", "code": "A" },
        "b": { "default": "unset", "type": "string", "code": "B" }
    }))
    .unwrap();
    let providers: Vec<Arc<dyn ValueProvider>> = vec![
        Arc::new(StoreValueProvider::new(
            repo.clone(),
            StoreProviderOptions {
                create_missing: false,
                service_name: SERVICE.to_string(),
                ..Default::default()
            }
            .with_trigger(trigger.clone()),
        )),
        Arc::new(EnvValueProvider::with_source(Arc::new(
            MapEnv::new().with("CFG_A", "env-a").with("CFG_B", "env-b"),
        ))),
    ];

    settings.load(&providers).await.unwrap();
    assert_eq!(settings.get("a").unwrap(), SettingValue::from("store-a"));
    assert_eq!(settings.get("b").unwrap(), SettingValue::from("store-b"));

    assert!(records.update(SERVICE, None, "B", json!("store-b2")));
    repo.hold_next_find();

    let second = {
        let settings = settings.clone();
        let providers = providers.clone();
        tokio::spawn(async move { settings.load(&providers).await })
    };

    repo.entered.notified().await;
    trigger.fire().await.unwrap();
    assert_eq!(settings.get("b").unwrap(), SettingValue::from("store-b2"));

    repo.release.notify_one();
    second.await.unwrap().unwrap();

    assert_eq!(settings.get("a").unwrap(), SettingValue::from("store-a"));
    assert_eq!(settings.get("b").unwrap(), SettingValue::from("store-b2"));
}
