// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-source mapping from event name to its listeners.
//!
//! All mutation happens under the map's lock and returns an [`Outcome`]
//! describing whether the event changed between empty and non-empty. The
//! caller notifies lifecycle hooks afterwards, once the lock is released.

use std::collections::HashMap;
use std::collections::hash_map::Entry as Slot;
use std::sync::Arc;

use parking_lot::Mutex;

use super::entry::{Entry, Handler, Scope};
use super::list::{InFlight, SharedList, Watchers};

/// Effect of a single mutation on one event's listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Nothing changed (duplicate registration or no match).
    Ignored,
    /// Listeners changed, the event stayed non-empty.
    Updated,
    /// The event went from empty to non-empty.
    Watched,
    /// The event went from non-empty to empty.
    Unwatched,
}

impl Outcome {
    pub(crate) fn changed(self) -> bool {
        self != Self::Ignored
    }
}

/// What a dispatch iterates.
pub(crate) enum Snapshot<A: ?Sized> {
    Single(Arc<Entry<A>>),
    Multi(InFlight<Entry<A>>),
}

/// Mapping from event name to [`Watchers`].
pub(crate) struct WatcherMap<A: ?Sized> {
    slots: Mutex<HashMap<String, Watchers<A>>>,
}

impl<A: ?Sized> WatcherMap<A> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Adds `entry` unless a listener with the same handler and scope exists.
    pub(crate) fn add(&self, event: &str, entry: &Arc<Entry<A>>) -> Outcome {
        let mut slots = self.slots.lock();

        let Some(watchers) = slots.get_mut(event) else {
            slots.insert(event.to_string(), Watchers::Single(Arc::clone(entry)));
            return Outcome::Watched;
        };

        if watchers.find(&entry.handler, entry.scope.as_ref()).is_some() {
            return Outcome::Ignored;
        }

        let promoted = match watchers {
            Watchers::Single(existing) => vec![Arc::clone(existing), Arc::clone(entry)],
            Watchers::Multi(list) => {
                SharedList::writable(list).push(Arc::clone(entry));
                return Outcome::Updated;
            }
        };
        *watchers = Watchers::Multi(Arc::new(SharedList::from_vec(promoted)));
        Outcome::Updated
    }

    /// Removes the first listener matching `handler` and `scope`.
    pub(crate) fn remove_matching(
        &self,
        event: &str,
        handler: &Handler<A>,
        scope: Option<&Scope<A>>,
    ) -> Outcome {
        let mut slots = self.slots.lock();
        let index = slots
            .get(event)
            .and_then(|watchers| watchers.find(handler, scope));
        match index {
            Some(index) => remove_at(&mut slots, event, index),
            None => Outcome::Ignored,
        }
    }

    /// Removes exactly this registration, wherever it now lives.
    pub(crate) fn remove_entry(&self, event: &str, entry: &Arc<Entry<A>>) -> Outcome {
        let mut slots = self.slots.lock();
        let index = slots
            .get(event)
            .and_then(|watchers| watchers.position_of(entry));
        match index {
            Some(index) => remove_at(&mut slots, event, index),
            None => Outcome::Ignored,
        }
    }

    /// Drops every listener of `event`.
    pub(crate) fn clear(&self, event: &str) -> Outcome {
        if self.slots.lock().remove(event).is_some() {
            Outcome::Unwatched
        } else {
            Outcome::Ignored
        }
    }

    /// Drops every listener of every event, returning the cleared names.
    pub(crate) fn clear_all(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.lock().drain().map(|(name, _)| name).collect();
        names.sort();
        names
    }

    /// Captures what a dispatch of `event` should iterate.
    ///
    /// For multi lists the in-flight counter is raised before the lock is
    /// released, so no mutation can slip in between reading and marking.
    pub(crate) fn snapshot(&self, event: &str) -> Option<Snapshot<A>> {
        let slots = self.slots.lock();
        slots.get(event).map(|watchers| match watchers {
            Watchers::Single(entry) => Snapshot::Single(Arc::clone(entry)),
            Watchers::Multi(list) => Snapshot::Multi(InFlight::enter(list)),
        })
    }

    pub(crate) fn contains(&self, event: &str) -> bool {
        self.slots.lock().contains_key(event)
    }

    pub(crate) fn len(&self, event: &str) -> usize {
        self.slots.lock().get(event).map_or(0, Watchers::len)
    }

    /// Names of all events with at least one listener, sorted.
    pub(crate) fn events(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Merges `other`'s listeners into this map.
    ///
    /// Events missing here adopt `other`'s listeners as they are. Events
    /// present on both sides become a fresh multi list holding this map's
    /// entries followed by `other`'s. No duplicate suppression is applied.
    /// Returns the events that went from empty to non-empty, sorted.
    pub(crate) fn merge(&self, other: &Self) -> Vec<String> {
        // Never hold both locks at once.
        let incoming: Vec<(String, Watchers<A>)> = other
            .slots
            .lock()
            .iter()
            .map(|(name, watchers)| (name.clone(), watchers.clone()))
            .collect();

        let mut watched = Vec::new();
        let mut slots = self.slots.lock();

        for (name, from) in incoming {
            match slots.entry(name) {
                Slot::Vacant(vacant) => {
                    watched.push(vacant.key().clone());
                    vacant.insert(from);
                }
                Slot::Occupied(mut occupied) => {
                    let mut combined = Vec::with_capacity(occupied.get().len() + from.len());
                    occupied.get().extend_into(&mut combined);
                    from.extend_into(&mut combined);
                    occupied.insert(Watchers::Multi(Arc::new(SharedList::from_vec(combined))));
                }
            }
        }

        watched.sort();
        watched
    }
}

/// Removes the listener at `index`, clearing the slot when it was the last.
fn remove_at<A: ?Sized>(
    slots: &mut HashMap<String, Watchers<A>>,
    event: &str,
    index: usize,
) -> Outcome {
    if let Some(Watchers::Multi(list)) = slots.get_mut(event)
        && list.len() > 1
    {
        SharedList::writable(list).remove(index);
        return Outcome::Updated;
    }
    slots
        .remove(event)
        .map_or(Outcome::Ignored, |_| Outcome::Unwatched)
}
