//! Repository trait for persisted config records
//!
//! Record-backed providers read and create records through this trait.
//! Implementations are in infra/storage/repositories.rs

use crate::contract::ValueType;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Persisted value of one setting for one service
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigRecord {
    pub id: i64,
    /// Owning service name
    pub service: String,
    /// `None` for rows shared by every version of the service
    pub service_version: Option<String>,
    /// Correlation code matching `Item::code`
    pub code: String,
    /// Item name at creation time, informational
    pub name: String,
    pub value: StoredValue,
    /// Bumped on every change; drives incremental reloads
    pub changes_check: DateTime<Utc>,
    pub meta: Option<serde_json::Value>,
}

/// Typed payload of a record
#[derive(Debug, Clone, PartialEq)]
pub struct StoredValue {
    pub value_type: ValueType,
    pub data: serde_json::Value,
}

/// Record to create
#[derive(Debug, Clone, PartialEq)]
pub struct NewConfigRecord {
    pub service: String,
    pub service_version: Option<String>,
    pub code: String,
    pub name: String,
    pub value: StoredValue,
    pub changes_check: DateTime<Utc>,
}

/// Which rows of a service a query covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionScope {
    /// Rows without a service version
    Unversioned,
    /// Rows of exactly this version
    Exactly(String),
}

/// Record query
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFilter {
    pub service: String,
    pub version: VersionScope,
    /// Restrict to these codes
    pub codes: Option<Vec<String>>,
    /// Only rows changed strictly after this instant
    pub changed_after: Option<DateTime<Utc>>,
}

impl RecordFilter {
    pub fn matches(&self, record: &ConfigRecord) -> bool {
        let version_matches = match &self.version {
            VersionScope::Unversioned => record.service_version.is_none(),
            VersionScope::Exactly(version) => record.service_version.as_deref() == Some(version),
        };

        record.service == self.service
            && version_matches
            && self
                .codes
                .as_ref()
                .map_or(true, |codes| codes.contains(&record.code))
            && self
                .changed_after
                .map_or(true, |after| record.changes_check > after)
    }
}

/// Repository for config records
#[async_trait]
pub trait ConfigRecordRepository: Send + Sync {
    /// Find records matching a filter
    async fn find(&self, filter: &RecordFilter) -> Result<Vec<ConfigRecord>>;

    /// Create a record
    async fn save(&self, record: NewConfigRecord) -> Result<ConfigRecord>;
}
