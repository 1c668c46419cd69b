// Copyright 2022-2023 Debox Network
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Startup configuration: the exposed drives, the recycler and lock limits.
///
/// ```toml
/// [drives]
/// docs = "/srv/dav/docs"
///
/// [recycler]
/// name = "_recycler"
///
/// [locks]
/// default_timeout_secs = 120
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct DavConfig {
    /// Drive name to physical root directory.
    pub drives: BTreeMap<String, PathBuf>,

    pub recycler: RecyclerConfig,

    #[serde(default)]
    pub locks: LockConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecyclerConfig {
    /// Directory name of the recycler inside each drive root.
    pub name: String,

    /// External recycler root. Each drive gets a subdirectory named after it.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_timeout")]
    pub default_timeout_secs: u64,

    #[serde(default = "max_lock_timeout")]
    pub max_timeout_secs: u64,

    /// Period of the background expiry sweep, none disables it.
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

fn default_lock_timeout() -> u64 {
    120
}

fn max_lock_timeout() -> u64 {
    3600
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_lock_timeout(),
            max_timeout_secs: max_lock_timeout(),
            sweep_interval_secs: None,
        }
    }
}

impl LockConfig {
    /// Timeout granted for a requested one: absent means default, anything
    /// above the maximum is clamped.
    pub fn effective_timeout(&self, requested: Option<u64>) -> Duration {
        let secs = requested
            .unwrap_or(self.default_timeout_secs)
            .clamp(1, self.max_timeout_secs);
        Duration::from_secs(secs)
    }
}

impl DavConfig {
    /// Creates a configuration with the given recycler name and no drives.
    pub fn new(recycler_name: &str) -> Self {
        Self {
            drives: BTreeMap::new(),
            recycler: RecyclerConfig {
                name: recycler_name.to_string(),
                path: None,
            },
            locks: LockConfig::default(),
        }
    }

    /// Adds a drive, builder style.
    pub fn drive(mut self, name: &str, root: impl Into<PathBuf>) -> Self {
        self.drives.insert(name.to_string(), root.into());
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: DavConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    /// Checks everything that can be checked without touching the disk.
    /// Drive roots are probed later, when the resolver is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.drives.is_empty() {
            return Err(ConfigError::NoDrives);
        }
        for (name, root) in &self.drives {
            if !is_single_segment(name) {
                return Err(ConfigError::InvalidDrive(name.clone()));
            }
            if root.as_os_str().is_empty() {
                return Err(ConfigError::DriveRoot {
                    drive: name.clone(),
                    reason: "root is empty".to_string(),
                });
            }
        }
        if !is_single_segment(&self.recycler.name) {
            return Err(ConfigError::InvalidRecycler(format!(
                "name {:?} must be a single path segment",
                self.recycler.name
            )));
        }
        if let Some(path) = &self.recycler.path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidRecycler("path is empty".to_string()));
            }
        }
        let locks = &self.locks;
        if locks.default_timeout_secs == 0 || locks.default_timeout_secs > locks.max_timeout_secs {
            return Err(ConfigError::InvalidLockTimeout(format!(
                "default {} must be within 1..={}",
                locks.default_timeout_secs, locks.max_timeout_secs
            )));
        }
        if locks.sweep_interval_secs == Some(0) {
            return Err(ConfigError::InvalidLockTimeout(
                "sweep interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_single_segment(s: &str) -> bool {
    !s.trim().is_empty()
        && s != "."
        && s != ".."
        && !s.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = DavConfig::from_toml_str(
            r#"
            [drives]
            docs = "/srv/docs"
            media = "/srv/media"

            [recycler]
            name = "_recycler"
            path = "/srv/trash"

            [locks]
            default_timeout_secs = 60
            max_timeout_secs = 600
            sweep_interval_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.drives.len(), 2);
        assert_eq!(config.drives["docs"], PathBuf::from("/srv/docs"));
        assert_eq!(config.recycler.path, Some(PathBuf::from("/srv/trash")));
        assert_eq!(config.locks.default_timeout_secs, 60);
        assert_eq!(config.locks.sweep_interval_secs, Some(30));
    }

    #[test]
    fn lock_section_is_optional() {
        let config = DavConfig::from_toml_str(
            r#"
            [drives]
            docs = "/srv/docs"
            [recycler]
            name = "_recycler"
            "#,
        )
        .unwrap();
        assert_eq!(config.locks.default_timeout_secs, 120);
        assert_eq!(config.locks.max_timeout_secs, 3600);
    }

    #[test]
    fn rejects_missing_drives() {
        let err = DavConfig::new("_recycler").validate().unwrap_err();
        assert!(matches!(err, ConfigError::NoDrives));
    }

    #[test]
    fn rejects_bad_names() {
        let err = DavConfig::new("_recycler")
            .drive("a/b", "/srv")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDrive(_)));

        let err = DavConfig::new("  ").drive("docs", "/srv").validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRecycler(_)));

        let err = DavConfig::new("..").drive("docs", "/srv").validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRecycler(_)));
    }

    #[test]
    fn rejects_missing_recycler_section() {
        let err = DavConfig::from_toml_str("[drives]\ndocs = \"/srv\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn timeouts_are_defaulted_and_clamped() {
        let locks = LockConfig {
            default_timeout_secs: 120,
            max_timeout_secs: 600,
            sweep_interval_secs: None,
        };
        assert_eq!(locks.effective_timeout(None), Duration::from_secs(120));
        assert_eq!(locks.effective_timeout(Some(5)), Duration::from_secs(5));
        assert_eq!(locks.effective_timeout(Some(100_000)), Duration::from_secs(600));
        assert_eq!(locks.effective_timeout(Some(0)), Duration::from_secs(1));
    }
}
