use crate::cache::KeyLevel;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "route.verb", "KEA_CACHE_MAX_SIZE")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected format, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "route_key", "cache_config")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the cache crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An invalidation path did not resolve at the requested granularity.
    #[error("{level} '{name}' not found in cache")]
    NotFound { level: KeyLevel, name: String },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn not_found(level: KeyLevel, name: impl Into<String>) -> Self {
        Error::NotFound {
            level,
            name: name.into(),
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Validation { context, .. } | Error::Configuration { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    /// The key level that failed to resolve, for `NotFound` errors.
    pub fn missing_level(&self) -> Option<KeyLevel> {
        match self {
            Error::NotFound { level, .. } => Some(*level),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display_names_level() {
        let err = Error::not_found(KeyLevel::Scope, "octocat");
        assert_eq!(err.to_string(), "scope 'octocat' not found in cache");
        assert_eq!(err.missing_level(), Some(KeyLevel::Scope));
        assert!(err.is_not_found());
        assert!(err.context().is_none());
    }

    #[test]
    fn test_context_formatting() {
        let err = Error::validation_with_context(
            "unsupported verb",
            ErrorContext::new()
                .with_field_path("route.verb")
                .with_source("route_key"),
        );
        assert_eq!(
            err.to_string(),
            "Validation error: unsupported verb (field: route.verb, source: route_key)"
        );
        assert_eq!(
            err.context().and_then(|c| c.source.as_deref()),
            Some("route_key")
        );

        let bare = Error::configuration_with_context("max_size must be > 0", ErrorContext::new());
        assert_eq!(bare.to_string(), "Configuration error: max_size must be > 0");
    }
}
