// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handles for removing bulk registrations.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::watchable::{Shared, Watchable};
use crate::watcher::Entry;

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a [`Token`], for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenId(u64);

impl TokenId {
    fn next() -> Self {
        Self(NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.0)
    }
}

/// Removes the registrations made by one
/// [`Watchable::listen`](crate::Watchable::listen) call.
///
/// The token remembers each registration record rather than its position,
/// so removal still works after the event's listener list was replaced by
/// copy-on-write, by other `on`/`off` calls, or by
/// [`unify`](crate::unify). Registrations already removed by other means
/// are skipped, which makes [`destroy`](Self::destroy) safe to call any
/// number of times.
///
/// A token keeps its source alive, so its registrations stay removable
/// after the source's own handles are gone (for example once another
/// source has adopted its listener map through `unify`). Dropping a token
/// does not remove anything.
pub struct Token<A: ?Sized + 'static> {
    id: TokenId,
    source: Arc<Shared<A>>,
    entries: Vec<(String, Arc<Entry<A>>)>,
}

impl<A: ?Sized + 'static> Token<A> {
    pub(crate) fn new(source: Arc<Shared<A>>) -> Self {
        Self {
            id: TokenId::next(),
            source,
            entries: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, event: &str, entry: Arc<Entry<A>>) {
        self.entries.push((event.to_string(), entry));
    }

    /// Returns this token's ID.
    #[must_use]
    pub fn id(&self) -> TokenId {
        self.id
    }

    /// Number of registrations this token tracks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the token tracks no registrations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every registration this token tracks.
    ///
    /// Returns the number of listeners actually removed by this call.
    pub fn destroy(&self) -> usize {
        let source = Watchable::from_shared(Arc::clone(&self.source));

        let removed = self
            .entries
            .iter()
            .filter(|(event, entry)| source.remove_entry(event, entry))
            .count();

        tracing::debug!(token = %self.id, removed, "Token destroyed");
        removed
    }

    /// Alias of [`destroy`](Self::destroy).
    pub fn close(&self) -> usize {
        self.destroy()
    }
}

impl<A: ?Sized + 'static> fmt::Debug for Token<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let events: Vec<&str> = self.entries.iter().map(|(event, _)| event.as_str()).collect();
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("events", &events)
            .finish()
    }
}
