// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bulk registration.

use std::fmt;

use crate::watcher::{Handler, Scope};

/// A set of event/handler pairs registered together, optionally sharing one
/// scope.
///
/// Pass it to [`Watchable::listen`](crate::Watchable::listen) to register
/// everything at once and get back a [`Token`](crate::Token) for removal.
/// Entries keep their insertion order; naming an event a second time
/// replaces its handler.
///
/// # Examples
///
/// ```
/// use watchable::{Handler, Manifest, Watchable};
///
/// let source = Watchable::<u32>::new();
/// let manifest = Manifest::new()
///     .on("open", Handler::new(|_: &u32| {}))
///     .on("close", Handler::new(|_: &u32| {}));
///
/// let token = source.listen(&manifest)?;
/// assert!(source.has_listeners("open"));
///
/// token.destroy();
/// assert!(!source.has_listeners("open"));
/// assert!(!source.has_listeners("close"));
/// # Ok::<(), watchable::Error>(())
/// ```
pub struct Manifest<A: ?Sized> {
    scope: Option<Scope<A>>,
    entries: Vec<(String, Handler<A>)>,
}

impl<A: ?Sized> Manifest<A> {
    /// Creates an empty manifest with no scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scope: None,
            entries: Vec::new(),
        }
    }

    /// Binds every entry to `scope`.
    #[must_use]
    pub fn with_scope(mut self, scope: Scope<A>) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Adds (or replaces) the handler for `event`.
    #[must_use]
    pub fn on(mut self, event: impl Into<String>, handler: Handler<A>) -> Self {
        let event = event.into();
        match self.entries.iter_mut().find(|(name, _)| *name == event) {
            Some((_, existing)) => *existing = handler,
            None => self.entries.push((event, handler)),
        }
        self
    }

    /// The shared scope, if any.
    #[must_use]
    pub fn scope(&self) -> Option<&Scope<A>> {
        self.scope.as_ref()
    }

    /// Iterates over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Handler<A>)> {
        self.entries
            .iter()
            .map(|(event, handler)| (event.as_str(), handler))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<A: ?Sized> Default for Manifest<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ?Sized> Clone for Manifest<A> {
    fn clone(&self) -> Self {
        Self {
            scope: self.scope.clone(),
            entries: self.entries.clone(),
        }
    }
}

impl<A: ?Sized> fmt::Debug for Manifest<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manifest")
            .field("scope", &self.scope)
            .field("entries", &self.entries)
            .finish()
    }
}
