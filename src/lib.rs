// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `watchable` - attachable, re-entrant, in-process event sources.
//!
//! Any type becomes an event source by embedding a [`Watchable`] and
//! implementing [`Observable`]. Listeners are registered per event name and
//! invoked synchronously, in registration order, by `fire`.
//!
//! # Supported Features
//!
//! - **Cheap common case**: an event with one listener stores it directly;
//!   dispatch of zero or one listener allocates nothing
//! - **Re-entrant dispatch**: handlers may add, remove and fire while being
//!   dispatched; lists being iterated are copied on write, never mutated
//! - **Early stop**: a handler returning [`Flow::Stop`] ends the `fire` call
//! - **Once**: [`Watchable::once`] registrations remove themselves
//! - **Bulk registration**: [`Watchable::listen`] takes a [`Manifest`] and
//!   returns a [`Token`] that removes exactly those registrations
//! - **Late binding**: [`Handler::Method`] is looked up on its [`Scope`] at
//!   call time
//! - **Merging**: [`unify`] makes two sources share one listener map
//! - **Relays**: [`Watchable::relay_events`] forwards events to another source
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use watchable::{Flow, Handler, Manifest, Watchable};
//!
//! let source = Watchable::<u32>::new();
//! let seen = Arc::new(AtomicU32::new(0));
//!
//! let s = Arc::clone(&seen);
//! let log = Handler::new(move |value: &u32| {
//!     s.fetch_add(*value, Ordering::SeqCst);
//! });
//! source.on("data", &log)?;
//!
//! // Later listeners are skipped once one returns Flow::Stop
//! source.on("data", &Handler::new(|_: &u32| Flow::Stop))?;
//! assert_eq!(source.fire("data", &3), Flow::Stop);
//! assert_eq!(seen.load(Ordering::SeqCst), 3);
//!
//! // Register several listeners at once and remove them together
//! let token = source.listen(
//!     &Manifest::new()
//!         .on("open", Handler::new(|_: &u32| {}))
//!         .on("close", Handler::new(|_: &u32| {})),
//! )?;
//! token.destroy();
//! assert!(!source.has_listeners("open"));
//! # Ok::<(), watchable::Error>(())
//! ```

pub mod config;
pub mod error;
mod manifest;
mod observable;
pub mod relay;
mod token;
mod watchable;
pub mod watcher;

pub use config::{FailurePolicy, ReservedKeys, WatchableConfig};
pub use error::{Error, Result};
pub use manifest::Manifest;
pub use observable::{Observable, all_off, has_listeners, is_watchable, unify};
pub use relay::{Relay, RelayAdapter, RelayHandle, RelayOptions, Route};
pub use token::{Token, TokenId};
pub use watchable::{WatchHooks, Watchable};
pub use watcher::{Context, Flow, Handler, MethodTable, Scope};
