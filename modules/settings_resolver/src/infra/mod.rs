//! Infrastructure layer - concrete providers, triggers and storage

pub mod providers;
pub mod storage;
pub mod triggers;
