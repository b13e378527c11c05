//! Storage layer - config record repositories

pub mod repositories;

pub use repositories::InMemoryConfigRecordRepository;
