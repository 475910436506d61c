// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Forwarding events from one source to another.
//!
//! After local listeners have run (and none returned [`Flow::Stop`]),
//! `fire` hands the event to every relay attached to the source. Relays are
//! kept in a copy-on-write list with the same in-flight discipline as
//! listener lists, so relays may be attached or removed while forwarding.
//!
//! [`Watchable::relay_events`] attaches the built-in [`EventRelay`]. Hosts
//! with their own forwarding rules implement [`RelayAdapter`] and use
//! [`Watchable::relay_events_with`].
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use watchable::{Handler, RelayOptions, Watchable};
//!
//! let source = Watchable::<u32>::new();
//! let target = Watchable::<u32>::new();
//! let seen = Arc::new(AtomicU32::new(0));
//!
//! let s = Arc::clone(&seen);
//! target.on("changed", &Handler::new(move |v: &u32| {
//!     s.store(*v, Ordering::SeqCst);
//! }))?;
//!
//! let relay = source.relay_events(&target, RelayOptions::rename([("update", "changed")]));
//! source.fire("update", &42);
//! assert_eq!(seen.load(Ordering::SeqCst), 42);
//!
//! relay.destroy();
//! source.fire("update", &7);
//! assert_eq!(seen.load(Ordering::SeqCst), 42);
//! # Ok::<(), watchable::Error>(())
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::watchable::{Shared, Watchable};
use crate::watcher::{Flow, InFlight, SharedList};

/// Something that forwards events fired on a source.
pub trait Relay<A: ?Sized>: Send + Sync {
    /// Forwards `event` with `args`.
    ///
    /// Returning [`Flow::Stop`] skips the remaining relays of this `fire`
    /// call. It is not reported to the caller of `fire`.
    fn relay(&self, event: &str, args: &A) -> Flow;
}

/// Builds relays between two sources.
pub trait RelayAdapter<A: ?Sized + 'static> {
    /// Creates a relay forwarding from `source` to `target`.
    fn create(
        &self,
        source: &Watchable<A>,
        target: &Watchable<A>,
        options: RelayOptions<A>,
    ) -> Arc<dyn Relay<A>>;
}

/// Type alias for custom forwarding functions.
///
/// Receives the target, the event name and the arguments.
pub type RelayFn<A> = Arc<dyn Fn(&Watchable<A>, &str, &A) -> Flow + Send + Sync>;

/// Which events an [`EventRelay`] forwards, and how.
pub enum RelayOptions<A: ?Sized + 'static> {
    /// Every event, under its own name.
    All,
    /// Only the listed events, under their own names.
    Events(Vec<String>),
    /// Only the listed events, each with its own route.
    Routes(HashMap<String, Route<A>>),
    /// Every event, through one function.
    Custom(RelayFn<A>),
}

impl<A: ?Sized + 'static> RelayOptions<A> {
    /// Forwards only `events`.
    pub fn events<I, S>(events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Events(events.into_iter().map(Into::into).collect())
    }

    /// Forwards each source event under a new name.
    pub fn rename<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        Self::Routes(
            pairs
                .into_iter()
                .map(|(from, to)| (from.into(), Route::As(to.into())))
                .collect(),
        )
    }

    /// Forwards every event through `f`.
    pub fn custom<F, R>(f: F) -> Self
    where
        F: Fn(&Watchable<A>, &str, &A) -> R + Send + Sync + 'static,
        R: Into<Flow>,
    {
        Self::Custom(Arc::new(move |target: &Watchable<A>, event: &str, args: &A| {
            f(target, event, args).into()
        }))
    }
}

impl<A: ?Sized + 'static> fmt::Debug for RelayOptions<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Events(events) => f.debug_tuple("Events").field(events).finish(),
            Self::Routes(routes) => f.debug_tuple("Routes").field(routes).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// How one event is forwarded.
pub enum Route<A: ?Sized + 'static> {
    /// Under its own name.
    Same,
    /// Under another name.
    As(String),
    /// Through a function.
    With(RelayFn<A>),
}

impl<A: ?Sized + 'static> fmt::Debug for Route<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Same => f.write_str("Same"),
            Self::As(name) => f.debug_tuple("As").field(name).finish(),
            Self::With(_) => f.write_str("With(..)"),
        }
    }
}

/// The built-in relay: re-fires events on a target source.
///
/// Holds the target weakly; once the target is dropped the relay forwards
/// nothing.
pub struct EventRelay<A: ?Sized + 'static> {
    target: Weak<Shared<A>>,
    options: RelayOptions<A>,
}

impl<A: ?Sized + 'static> EventRelay<A> {
    /// Creates a relay re-firing on `target`.
    #[must_use]
    pub fn new(target: &Watchable<A>, options: RelayOptions<A>) -> Self {
        Self {
            target: target.downgrade(),
            options,
        }
    }
}

impl<A: ?Sized + 'static> Relay<A> for EventRelay<A> {
    fn relay(&self, event: &str, args: &A) -> Flow {
        let Some(shared) = self.target.upgrade() else {
            return Flow::Continue;
        };
        let target = Watchable::from_shared(shared);

        match &self.options {
            RelayOptions::All => target.fire(event, args),
            RelayOptions::Events(events) => {
                if events.iter().any(|name| name == event) {
                    target.fire(event, args)
                } else {
                    Flow::Continue
                }
            }
            RelayOptions::Routes(routes) => match routes.get(event) {
                None => Flow::Continue,
                Some(Route::Same) => target.fire(event, args),
                Some(Route::As(name)) => target.fire(name, args),
                Some(Route::With(f)) => f(&target, event, args),
            },
            RelayOptions::Custom(f) => f(&target, event, args),
        }
    }
}

/// The adapter behind [`Watchable::relay_events`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRelayAdapter;

impl<A: ?Sized + 'static> RelayAdapter<A> for DefaultRelayAdapter {
    fn create(
        &self,
        _source: &Watchable<A>,
        target: &Watchable<A>,
        options: RelayOptions<A>,
    ) -> Arc<dyn Relay<A>> {
        Arc::new(EventRelay::new(target, options))
    }
}

/// Detaches a relay from its source.
///
/// Dropping the handle leaves the relay attached.
pub struct RelayHandle<A: ?Sized + 'static> {
    source: Weak<Shared<A>>,
    relay: Arc<dyn Relay<A>>,
}

impl<A: ?Sized + 'static> RelayHandle<A> {
    /// Detaches the relay. Returns `false` if it was already detached.
    pub fn destroy(&self) -> bool {
        self.source
            .upgrade()
            .is_some_and(|shared| Watchable::from_shared(shared).remove_relay(&self.relay))
    }
}

impl<A: ?Sized + 'static> fmt::Debug for RelayHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayHandle")
            .field("relay", &Arc::as_ptr(&self.relay).cast::<()>())
            .finish_non_exhaustive()
    }
}

impl<A: ?Sized + 'static> Watchable<A> {
    /// Forwards events fired on this source to `target` using the built-in
    /// [`EventRelay`].
    pub fn relay_events(&self, target: &Watchable<A>, options: RelayOptions<A>) -> RelayHandle<A> {
        self.relay_events_with(&DefaultRelayAdapter, target, options)
    }

    /// Forwards events fired on this source to `target` through a relay
    /// built by `adapter`.
    pub fn relay_events_with<R>(
        &self,
        adapter: &R,
        target: &Watchable<A>,
        options: RelayOptions<A>,
    ) -> RelayHandle<A>
    where
        R: RelayAdapter<A> + ?Sized,
    {
        tracing::debug!(options = ?options, "Creating relay");
        let relay = adapter.create(self, target, options);
        self.add_relay(relay)
    }

    /// Attaches an existing relay to this source.
    pub fn add_relay(&self, relay: Arc<dyn Relay<A>>) -> RelayHandle<A> {
        {
            let mut relays = self.shared.relays.lock();
            match relays.as_mut() {
                Some(list) => SharedList::writable(list).push(Arc::clone(&relay)),
                None => *relays = Some(Arc::new(SharedList::from_vec(vec![Arc::clone(&relay)]))),
            }
        }
        RelayHandle {
            source: self.downgrade(),
            relay,
        }
    }

    pub(crate) fn remove_relay(&self, relay: &Arc<dyn Relay<A>>) -> bool {
        let mut relays = self.shared.relays.lock();
        let Some(list) = relays.as_mut() else {
            return false;
        };
        let Some(index) = list.position_of(relay) else {
            return false;
        };

        if list.len() > 1 {
            SharedList::writable(list).remove(index);
        } else {
            *relays = None;
        }
        tracing::debug!("Relay removed");
        true
    }

    /// Number of relays attached to this source.
    #[must_use]
    pub fn relay_count(&self) -> usize {
        self.shared.relays.lock().as_ref().map_or(0, |list| list.len())
    }

    pub(crate) fn forward(&self, event: &str, args: &A) {
        let Some(relays) = self.shared.relays.lock().as_ref().map(InFlight::enter) else {
            return;
        };
        for relay in relays.items() {
            if relay.relay(event, args).is_stop() {
                tracing::trace!(event = %event, "Relay forwarding stopped");
                break;
            }
        }
    }
}
