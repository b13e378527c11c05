//! Contract error types for the settings resolver

/// Settings resolver errors
#[derive(Debug, thiserror::Error)]
pub enum CfgError {
    /// Malformed schema definition, reported at tree construction
    #[error("Invalid schema at '{path}': {message}")]
    Schema {
        /// Path of the offending node
        path: String,
        /// What is wrong with it
        message: String,
    },

    /// Structured value could not be decoded from its textual form
    #[error("Cannot decode structured value for '{name}': {source}")]
    Coercion {
        /// Item name
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// A provider rejected its batch because required item metadata is missing
    #[error("Validation error: {message}")]
    Validation {
        /// Validation error message
        message: String,
    },

    /// A provider or its backing store failed
    #[error("Provider '{provider}' failed: {source}")]
    Provider {
        /// Provider name
        provider: String,
        #[source]
        source: anyhow::Error,
    },

    /// No setting at the given path
    #[error("Setting not found: {path}")]
    NotFound {
        /// Requested path
        path: String,
    },

    /// The path names a group node, not a leaf
    #[error("Not a leaf setting: {path}")]
    NotALeaf {
        /// Requested path
        path: String,
    },

    /// Trigger lifecycle failure
    #[error("Trigger error: {message}")]
    Trigger {
        /// Error details
        message: String,
    },

    /// A listener failed for a reason not covered above
    #[error("Listener failed: {0}")]
    Listener(#[source] anyhow::Error),
}

impl CfgError {
    pub fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Provider {
            provider: provider.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CfgError::schema("test1:", "empty segment");
        assert_eq!(err.to_string(), "Invalid schema at 'test1:': empty segment");

        let err = CfgError::NotFound {
            path: "a:b".to_string(),
        };
        assert_eq!(err.to_string(), "Setting not found: a:b");

        let err = CfgError::provider("store", anyhow::anyhow!("connection refused"));
        assert_eq!(err.to_string(), "Provider 'store' failed: connection refused");
    }

    #[test]
    fn test_coercion_error_keeps_source() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = CfgError::Coercion {
            name: "test3:settingOne".to_string(),
            source,
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("Cannot decode structured value for 'test3:settingOne'"));
    }
}
