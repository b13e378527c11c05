//! Value providers

pub mod env;
pub mod store;

pub use env::{EnvSource, EnvValueProvider, MapEnv, ProcessEnv};
pub use store::{StoreProviderOptions, StoreValueProvider};
