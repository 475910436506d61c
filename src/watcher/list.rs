// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Copy-on-write listener sequences.
//!
//! A [`SharedList`] is an ordered sequence plus a count of the dispatches
//! currently iterating that exact instance. Dispatch holds an [`InFlight`]
//! guard for the duration of its loop. Mutation goes through
//! [`SharedList::writable`], which swaps in a fresh copy (counter reset to
//! zero) whenever the current instance is being iterated, so an in-flight
//! loop never observes its sequence changing underneath it.

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::entry::{Entry, Handler, Scope};

/// An ordered sequence with an in-flight iteration counter.
pub(crate) struct SharedList<T: ?Sized> {
    items: Vec<Arc<T>>,
    in_flight: AtomicUsize,
}

impl<T: ?Sized> SharedList<T> {
    pub(crate) fn from_vec(items: Vec<Arc<T>>) -> Self {
        Self {
            items,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Number of dispatches currently iterating this instance.
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub(crate) fn items(&self) -> &[Arc<T>] {
        &self.items
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns the list behind `slot` ready for mutation.
    ///
    /// The instance in `slot` is replaced by a copy when a dispatch is
    /// iterating it, or when anything else still holds a reference to it.
    pub(crate) fn writable(slot: &mut Arc<Self>) -> &mut Self {
        if slot.in_flight() > 0 {
            *slot = Arc::new(Self::clone(slot));
        }
        Arc::make_mut(slot)
    }

    pub(crate) fn push(&mut self, item: Arc<T>) {
        self.items.push(item);
    }

    pub(crate) fn remove(&mut self, index: usize) -> Arc<T> {
        self.items.remove(index)
    }

    /// Position of `item` by pointer identity.
    pub(crate) fn position_of(&self, item: &Arc<T>) -> Option<usize> {
        self.items.iter().position(|it| Arc::ptr_eq(it, item))
    }
}

impl<T: ?Sized> Clone for SharedList<T> {
    /// Shallow copy of the sequence. The copy starts with no dispatch in flight.
    fn clone(&self) -> Self {
        Self::from_vec(self.items.clone())
    }
}

/// Marks one dispatch iterating a [`SharedList`].
///
/// The counter is decremented on drop, including while unwinding out of a
/// panicking handler.
pub(crate) struct InFlight<T: ?Sized> {
    list: Arc<SharedList<T>>,
}

impl<T: ?Sized> InFlight<T> {
    pub(crate) fn enter(list: &Arc<SharedList<T>>) -> Self {
        list.in_flight.fetch_add(1, Ordering::AcqRel);
        Self {
            list: Arc::clone(list),
        }
    }
}

impl<T: ?Sized> Deref for InFlight<T> {
    type Target = SharedList<T>;

    fn deref(&self) -> &Self::Target {
        &self.list
    }
}

impl<T: ?Sized> Drop for InFlight<T> {
    fn drop(&mut self) {
        self.list.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// All listeners for one event name.
///
/// An event with no listeners has no `Watchers` at all: the map entry is
/// removed.
pub(crate) enum Watchers<A: ?Sized> {
    /// Exactly one listener, stored without a sequence wrapper.
    Single(Arc<Entry<A>>),
    /// Any number of listeners (at least one) in registration order.
    Multi(Arc<SharedList<Entry<A>>>),
}

impl<A: ?Sized> Watchers<A> {
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multi(list) => list.len(),
        }
    }

    /// Position of the listener matching `handler` and `scope`.
    pub(crate) fn find(&self, handler: &Handler<A>, scope: Option<&Scope<A>>) -> Option<usize> {
        match self {
            Self::Single(entry) => entry.matches(handler, scope).then_some(0),
            Self::Multi(list) => list
                .items()
                .iter()
                .position(|entry| entry.matches(handler, scope)),
        }
    }

    /// Position of exactly this registration.
    pub(crate) fn position_of(&self, entry: &Arc<Entry<A>>) -> Option<usize> {
        match self {
            Self::Single(only) => Arc::ptr_eq(only, entry).then_some(0),
            Self::Multi(list) => list.position_of(entry),
        }
    }

    /// Appends every entry to `out`, flattening either shape.
    pub(crate) fn extend_into(&self, out: &mut Vec<Arc<Entry<A>>>) {
        match self {
            Self::Single(entry) => out.push(Arc::clone(entry)),
            Self::Multi(list) => out.extend(list.items().iter().cloned()),
        }
    }
}

impl<A: ?Sized> Clone for Watchers<A> {
    fn clone(&self) -> Self {
        match self {
            Self::Single(entry) => Self::Single(Arc::clone(entry)),
            Self::Multi(list) => Self::Multi(Arc::clone(list)),
        }
    }
}
