// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `watchable` library.
//!
//! Dispatch itself is infallible: a handler that panics unwinds out of
//! `fire` unless the instance was configured with
//! [`FailurePolicy::Isolate`](crate::config::FailurePolicy::Isolate).
//! The errors here cover registration misuse and configuration loading.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A method-name handler was registered without a scope to resolve it on.
    #[error("method handler `{method}` for event `{event}` requires a scope")]
    UnboundMethod {
        /// The event the handler was registered for.
        event: String,
        /// The method name that could not be bound.
        method: String,
    },

    /// A reserved manifest key was registered twice.
    #[error("reserved key `{0}` is already registered")]
    DuplicateReservedKey(String),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_method_display() {
        let err = Error::UnboundMethod {
            event: "change".to_string(),
            method: "onChange".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "method handler `onChange` for event `change` requires a scope"
        );
    }

    #[test]
    fn error_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn duplicate_reserved_key_display() {
        let err = Error::DuplicateReservedKey("scope".to_string());
        assert_eq!(err.to_string(), "reserved key `scope` is already registered");
    }
}
