//! Cache configuration.
//!
//! Values come from code via the `with_*` builders, or from the environment:
//! - `KEA_CACHE_MAX_SIZE` (default 1000)
//! - `KEA_BLOB_CACHE_MAX_SIZE` (default 100)
//! - `KEA_BLOB_CACHE_DIR` (default `<tmp>/kea/file-cache`)

use crate::{Error, ErrorContext, Result};
use std::path::PathBuf;

pub const DEFAULT_MAX_SIZE: usize = 1000;
pub const DEFAULT_BLOB_MAX_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Capacity of the response cache, in entries.
    pub max_size: usize,
    /// Capacity of the blob cache, in files.
    pub blob_max_size: usize,
    /// Root directory for cached blob files.
    pub blob_dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            blob_max_size: DEFAULT_BLOB_MAX_SIZE,
            blob_dir: std::env::temp_dir().join("kea").join("file-cache"),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_blob_max_size(mut self, blob_max_size: usize) -> Self {
        self.blob_max_size = blob_max_size;
        self
    }

    pub fn with_blob_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.blob_dir = dir.into();
        self
    }

    /// Defaults overridden by any `KEA_*` variables that are set.
    ///
    /// A variable that is set but not a valid size is an error rather than
    /// silently falling back to the default.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(n) = env_size("KEA_CACHE_MAX_SIZE")? {
            cfg.max_size = n;
        }
        if let Some(n) = env_size("KEA_BLOB_CACHE_MAX_SIZE")? {
            cfg.blob_max_size = n;
        }
        if let Some(dir) = std::env::var_os("KEA_BLOB_CACHE_DIR").filter(|d| !d.is_empty()) {
            cfg.blob_dir = PathBuf::from(dir);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("max_size", self.max_size),
            ("blob_max_size", self.blob_max_size),
        ];
        for (field, value) in sizes {
            if value == 0 {
                return Err(Error::configuration_with_context(
                    format!("{} must be greater than zero", field),
                    ErrorContext::new()
                        .with_field_path(field)
                        .with_source("cache_config"),
                ));
            }
        }
        Ok(())
    }
}

fn env_size(var: &str) -> Result<Option<usize>> {
    let Ok(raw) = std::env::var(var) else {
        return Ok(None);
    };
    raw.trim().parse::<usize>().map(Some).map_err(|e| {
        Error::configuration_with_context(
            format!("invalid value for {}", var),
            ErrorContext::new()
                .with_field_path(var)
                .with_details(format!("'{}': {}", raw, e))
                .with_source("cache_config"),
        )
    })
}
