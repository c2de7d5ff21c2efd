pub mod error;

pub use error::{ConfigError, KubeError, LifecycleError, Operation, ProviderError, Result, StateError};
