// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration for watchable instances.
//!
//! A [`WatchableConfig`] is handed to [`Watchable::with_config`] and owned by
//! that instance from then on. It carries the reserved manifest keys and the
//! failure policy used while dispatching.
//!
//! # Examples
//!
//! ```
//! use watchable::config::{FailurePolicy, WatchableConfig};
//!
//! let config = WatchableConfig::default()
//!     .with_reserved_key("priority")?
//!     .with_failure_policy(FailurePolicy::Isolate);
//!
//! assert!(config.reserved.contains("scope"));
//! assert!(config.reserved.contains("priority"));
//! # Ok::<(), watchable::Error>(())
//! ```
//!
//! [`Watchable::with_config`]: crate::Watchable::with_config

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Manifest key that binds a shared scope to every manifest entry.
pub const SCOPE_KEY: &str = "scope";

/// Configuration for a [`Watchable`](crate::Watchable).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchableConfig {
    /// Manifest keys that are never treated as event names.
    pub reserved: ReservedKeys,
    /// What happens when a handler panics during dispatch.
    pub failure_policy: FailurePolicy,
}

impl WatchableConfig {
    /// Parses a configuration from JSON.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the input is not valid JSON for this type.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Adds a reserved manifest key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateReservedKey`] if the key is already reserved.
    pub fn with_reserved_key(mut self, key: impl Into<String>) -> Result<Self> {
        self.reserved.register(key)?;
        Ok(self)
    }

    /// Sets the failure policy.
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

/// The set of reserved manifest keys.
///
/// Starts out containing only [`SCOPE_KEY`]. Hosts extend it at
/// initialization time before handing the config to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservedKeys(BTreeSet<String>);

impl ReservedKeys {
    /// Reserves a key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateReservedKey`] if the key is already reserved.
    pub fn register(&mut self, key: impl Into<String>) -> Result<()> {
        let key = key.into();
        if self.0.contains(&key) {
            return Err(Error::DuplicateReservedKey(key));
        }
        self.0.insert(key);
        Ok(())
    }

    /// Returns `true` if `key` is reserved.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    /// Iterates over the reserved keys in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for ReservedKeys {
    fn default() -> Self {
        Self(BTreeSet::from([SCOPE_KEY.to_string()]))
    }
}

/// How dispatch reacts to a panicking handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The panic unwinds out of `fire`; remaining listeners and relays are
    /// not invoked for that call.
    #[default]
    Propagate,
    /// The panic is caught and logged; dispatch continues with the next
    /// listener.
    Isolate,
}
