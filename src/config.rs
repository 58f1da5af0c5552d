// canfd/src/config.rs
//
// Driver configuration.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! Driver configuration.
//!
//! The configuration is a small YAML document naming the CAN interface and,
//! optionally, the identifiers to accept:
//!
//! ```yaml
//! default_can_interface_name: vcan0
//! default_can_filter_ids: [256, 512]
//! read_timeout_ms: 500
//! ```
//!
//! A missing filter list means no filtering at all. Loading is
//! all-or-nothing: either a complete, validated [`Config`] is returned or a
//! [`ConfigError`] describing why not.

use crate::{CanFilter, ConfigError};
use itertools::Itertools;
use libc::{CAN_SFF_MASK, IFNAMSIZ};
use serde::Deserialize;
use std::{fs, io, path::Path, time::Duration};

/// The driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// The name of the CAN interface, like "can0" or "vcan0"
    #[serde(rename = "default_can_interface_name", alias = "interface")]
    pub interface_name: String,
    /// The CAN identifiers to accept. Empty accepts everything.
    #[serde(rename = "default_can_filter_ids", alias = "filters", default)]
    pub filter_ids: Vec<u32>,
    /// Receive timeout, at least 1 ms. Without one, a read blocks until a
    /// frame arrives.
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,
}

impl Config {
    /// Creates a configuration without a read timeout.
    pub fn new(interface_name: impl Into<String>, filter_ids: Vec<u32>) -> Self {
        Self {
            interface_name: interface_name.into(),
            filter_ids,
            read_timeout_ms: None,
        }
    }

    /// Loads and validates the configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound {
                path: path.into(),
                source,
            },
            _ => ConfigError::Io {
                path: path.into(),
                source,
            },
        })?;
        Self::from_yaml(&text)
    }

    /// Parses and validates the configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        // Two passes so that syntax errors and shape errors stay distinct.
        let doc: serde_yaml::Value = serde_yaml::from_str(text).map_err(ConfigError::Parse)?;
        let config: Config = serde_yaml::from_value(doc)?;
        config.validate()?;

        log::info!("Configuration loaded successfully.");
        log::info!("Interface name: {}", config.interface_name);
        log::info!("Filter IDs: {}", config.filter_ids.iter().join(" "));
        Ok(config)
    }

    /// Checks the values that the document shape alone can't enforce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interface_name.is_empty() {
            return Err(ConfigError::Schema("interface name is empty".into()));
        }
        // The kernel name buffer includes the terminating NUL.
        if self.interface_name.len() >= IFNAMSIZ {
            return Err(ConfigError::Schema(format!(
                "interface name '{}' is longer than {} bytes",
                self.interface_name,
                IFNAMSIZ - 1
            )));
        }
        if self.interface_name.contains('\0') {
            return Err(ConfigError::Schema("interface name contains NUL".into()));
        }
        // A zero SO_RCVTIMEO means "wait forever" to the kernel
        if self.read_timeout_ms == Some(0) {
            return Err(ConfigError::Schema(
                "read_timeout_ms must be at least 1; omit it to block".into(),
            ));
        }
        Ok(())
    }

    /// The receive timeout, if one is configured.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// One exact-match filter per configured identifier.
    ///
    /// Identifiers are compared under the standard 11-bit mask.
    pub fn filters(&self) -> Vec<CanFilter> {
        self.filter_ids
            .iter()
            .map(|&id| CanFilter::new(id, CAN_SFF_MASK))
            .collect()
    }
}

/////////////////////////////////////////////////////////////////////////////
