// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Listener storage.
//!
//! # Overview
//!
//! - [`Handler`] / [`Scope`] - What gets called, and the object it is bound to
//! - [`Flow`] - Handler return value; [`Flow::Stop`] halts dispatch
//! - [`MethodTable`] - A [`Context`] whose named methods can be redefined
//! - `Watchers` - Zero, one, or many registrations for one event
//! - `WatcherMap` - Event name to `Watchers`, shareable between sources
//!
//! The single-listener case is stored without any sequence wrapper. Lists of
//! two or more are copy-on-write: a dispatch marks the list it iterates, and
//! any mutation of a marked list replaces it in the map instead of touching
//! it.

mod entry;
mod list;
mod map;

pub use entry::{Callback, Context, Flow, Handler, MethodTable, Scope};

pub(crate) use entry::Entry;
pub(crate) use list::{InFlight, SharedList};
pub(crate) use map::{Outcome, Snapshot, WatcherMap};
