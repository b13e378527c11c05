//! Repository implementations

use crate::contract::ValueType;
use crate::domain::repository::{
    ConfigRecord, ConfigRecordRepository, NewConfigRecord, RecordFilter, StoredValue,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

// ===== In-memory Config Record Repository =====

/// Config records kept in process memory, for tests and embedding.
///
/// Change stamps are strictly increasing across the repository so that a
/// record touched after a read always sorts after everything that read saw.
#[derive(Default)]
pub struct InMemoryConfigRecordRepository {
    inner: RwLock<Table>,
}

#[derive(Default)]
struct Table {
    records: Vec<ConfigRecord>,
    next_id: i64,
    last_stamp: Option<DateTime<Utc>>,
}

impl Table {
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    fn insert(&mut self, record: NewConfigRecord) -> ConfigRecord {
        self.next_id += 1;
        let stamp = self.stamp();
        let record = ConfigRecord {
            id: self.next_id,
            service: record.service,
            service_version: record.service_version,
            code: record.code,
            name: record.name,
            value: record.value,
            changes_check: stamp.max(record.changes_check),
            meta: None,
        };
        self.last_stamp = Some(record.changes_check);
        self.records.push(record.clone());
        record
    }
}

impl InMemoryConfigRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly
    pub fn seed(
        &self,
        service: &str,
        service_version: Option<&str>,
        code: &str,
        value_type: ValueType,
        data: serde_json::Value,
    ) -> ConfigRecord {
        self.inner.write().insert(NewConfigRecord {
            service: service.to_string(),
            service_version: service_version.map(str::to_string),
            code: code.to_string(),
            name: code.to_string(),
            value: StoredValue { value_type, data },
            changes_check: DateTime::<Utc>::MIN_UTC,
        })
    }

    /// Replace the data of an existing record and bump its change stamp.
    /// Returns false when no record matches.
    pub fn update(
        &self,
        service: &str,
        service_version: Option<&str>,
        code: &str,
        data: serde_json::Value,
    ) -> bool {
        let mut table = self.inner.write();
        let stamp = table.stamp();

        let Some(record) = table.records.iter_mut().find(|r| {
            r.service == service && r.service_version.as_deref() == service_version && r.code == code
        }) else {
            return false;
        };

        record.value.data = data;
        record.changes_check = stamp;
        true
    }

    /// Snapshot of every record in insertion order
    pub fn records(&self) -> Vec<ConfigRecord> {
        self.inner.read().records.clone()
    }
}

#[async_trait]
impl ConfigRecordRepository for InMemoryConfigRecordRepository {
    async fn find(&self, filter: &RecordFilter) -> Result<Vec<ConfigRecord>> {
        let table = self.inner.read();
        Ok(table
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn save(&self, record: NewConfigRecord) -> Result<ConfigRecord> {
        let mut table = self.inner.write();
        if table.records.iter().any(|r| {
            r.service == record.service
                && r.service_version == record.service_version
                && r.code == record.code
        }) {
            anyhow::bail!(
                "Config record '{}' already exists for service '{}'",
                record.code,
                record.service
            );
        }
        Ok(table.insert(record))
    }
}
