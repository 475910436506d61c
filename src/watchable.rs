// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The event source: registration and dispatch.
//!
//! A [`Watchable`] owns a lazily created listener map, an optional list of
//! relays, and optional lifecycle hooks. Embed one in any type and implement
//! [`Observable`](crate::Observable) to expose the whole contract on that
//! type.
//!
//! # Re-entrancy
//!
//! No lock is held while a handler, hook or relay runs. A handler may call
//! `on`, `off`, `fire` or [`Token::destroy`] on any source, including the one
//! dispatching it:
//!
//! - listeners added during a `fire` call are not invoked by that call
//! - listeners removed during a `fire` call may still be invoked by it; the
//!   in-flight snapshot is never modified, only replaced in the map

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::config::{FailurePolicy, WatchableConfig};
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::relay::Relay;
use crate::token::Token;
use crate::watcher::{Entry, Flow, Handler, Outcome, Scope, SharedList, Snapshot, WatcherMap};

/// Lifecycle callbacks for an event source.
///
/// `on_event_watch` runs when an event gains its first listener and
/// `on_event_unwatch` when it loses its last one. Both run after the
/// listener map is updated and outside any lock.
pub trait WatchHooks: Send + Sync {
    /// An event went from no listeners to at least one.
    fn on_event_watch(&self, event: &str) {
        let _ = event;
    }

    /// An event went from at least one listener to none.
    fn on_event_unwatch(&self, event: &str) {
        let _ = event;
    }
}

pub(crate) struct Shared<A: ?Sized + 'static> {
    /// `None` until the first registration or `unify`.
    map: RwLock<Option<Arc<WatcherMap<A>>>>,
    pub(crate) relays: Mutex<Option<Arc<SharedList<dyn Relay<A>>>>>,
    hooks: RwLock<Option<Arc<dyn WatchHooks>>>,
    config: WatchableConfig,
}

/// An event source.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use watchable::{Flow, Handler, Watchable};
///
/// let source = Watchable::<u32>::new();
/// let total = Arc::new(AtomicU32::new(0));
///
/// let sum = Arc::clone(&total);
/// source.on("add", &Handler::new(move |n: &u32| {
///     sum.fetch_add(*n, Ordering::SeqCst);
/// }))?;
/// source.on("add", &Handler::new(|n: &u32| if *n > 10 { Flow::Stop } else { Flow::Continue }))?;
///
/// assert_eq!(source.fire("add", &5), Flow::Continue);
/// assert_eq!(source.fire("add", &20), Flow::Stop);
/// assert_eq!(total.load(Ordering::SeqCst), 25);
/// # Ok::<(), watchable::Error>(())
/// ```
pub struct Watchable<A: ?Sized + 'static> {
    pub(crate) shared: Arc<Shared<A>>,
}

impl<A: ?Sized + 'static> Watchable<A> {
    /// Creates a source with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WatchableConfig::default())
    }

    /// Creates a source with the given configuration.
    #[must_use]
    pub fn with_config(config: WatchableConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                map: RwLock::new(None),
                relays: Mutex::new(None),
                hooks: RwLock::new(None),
                config,
            }),
        }
    }

    /// Sets lifecycle hooks.
    #[must_use]
    pub fn with_hooks(self, hooks: Arc<dyn WatchHooks>) -> Self {
        self.set_hooks(Some(hooks));
        self
    }

    /// Replaces (or removes) the lifecycle hooks.
    pub fn set_hooks(&self, hooks: Option<Arc<dyn WatchHooks>>) {
        *self.shared.hooks.write() = hooks;
    }

    /// Returns the configuration this source was created with.
    #[must_use]
    pub fn config(&self) -> &WatchableConfig {
        &self.shared.config
    }

    pub(crate) fn from_shared(shared: Arc<Shared<A>>) -> Self {
        Self { shared }
    }

    pub(crate) fn downgrade(&self) -> Weak<Shared<A>> {
        Arc::downgrade(&self.shared)
    }

    // =========================================================================
    // Listener map
    // =========================================================================

    pub(crate) fn map(&self) -> Option<Arc<WatcherMap<A>>> {
        self.shared.map.read().clone()
    }

    fn map_or_init(&self) -> Arc<WatcherMap<A>> {
        if let Some(map) = self.map() {
            return map;
        }
        Arc::clone(
            self.shared
                .map
                .write()
                .get_or_insert_with(|| Arc::new(WatcherMap::new())),
        )
    }

    pub(crate) fn set_map(&self, map: Arc<WatcherMap<A>>) {
        *self.shared.map.write() = Some(map);
    }

    /// Returns `true` once a listener map exists for this source.
    #[must_use]
    pub fn has_map(&self) -> bool {
        self.shared.map.read().is_some()
    }

    /// Returns `true` if both sources use the same listener map.
    #[must_use]
    pub fn shares_map_with(&self, other: &Self) -> bool {
        match (self.map(), other.map()) {
            (Some(mine), Some(theirs)) => Arc::ptr_eq(&mine, &theirs),
            _ => false,
        }
    }

    pub(crate) fn notify(&self, event: &str, outcome: Outcome) {
        let hook = match outcome {
            Outcome::Watched => {
                tracing::debug!(event = %event, "Event gained its first listener");
                true
            }
            Outcome::Unwatched => {
                tracing::debug!(event = %event, "Event lost its last listener");
                false
            }
            Outcome::Ignored | Outcome::Updated => return,
        };

        let Some(hooks) = self.shared.hooks.read().clone() else {
            return;
        };
        if hook {
            hooks.on_event_watch(event);
        } else {
            hooks.on_event_unwatch(event);
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    fn ensure_bound(event: &str, handler: &Handler<A>, scope: Option<&Scope<A>>) -> Result<()> {
        match (handler.method_name(), scope) {
            (Some(method), None) => Err(Error::UnboundMethod {
                event: event.to_string(),
                method: method.to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn register(&self, event: &str, entry: &Arc<Entry<A>>) -> bool {
        let outcome = self.map_or_init().add(event, entry);
        self.notify(event, outcome);
        outcome.changed()
    }

    fn unregister(&self, event: &str, handler: &Handler<A>, scope: Option<&Scope<A>>) -> bool {
        let Some(map) = self.map() else {
            return false;
        };
        let outcome = map.remove_matching(event, handler, scope);
        self.notify(event, outcome);
        outcome.changed()
    }

    pub(crate) fn remove_entry(&self, event: &str, entry: &Arc<Entry<A>>) -> bool {
        let Some(map) = self.map() else {
            return false;
        };
        let outcome = map.remove_entry(event, entry);
        self.notify(event, outcome);
        outcome.changed()
    }

    /// Adds an unbound listener.
    ///
    /// Returns `Ok(false)` if the same handler is already registered for
    /// `event` without a scope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnboundMethod`] for a [`Handler::Method`], which
    /// needs a scope to resolve against.
    pub fn on(&self, event: &str, handler: &Handler<A>) -> Result<bool> {
        Self::ensure_bound(event, handler, None)?;
        Ok(self.register(event, &Arc::new(Entry::new(handler.clone(), None))))
    }

    /// Adds a listener bound to `scope`.
    ///
    /// Returns `false` if the same handler is already registered for `event`
    /// with the same scope.
    pub fn on_with(&self, event: &str, handler: &Handler<A>, scope: &Scope<A>) -> bool {
        self.register(
            event,
            &Arc::new(Entry::new(handler.clone(), Some(scope.clone()))),
        )
    }

    /// Adds an unbound listener that removes itself before its first run.
    ///
    /// The listener's return value is ignored, so it cannot stop dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnboundMethod`] for a [`Handler::Method`].
    pub fn once(&self, event: &str, handler: &Handler<A>) -> Result<bool> {
        Self::ensure_bound(event, handler, None)?;
        Ok(self.register(event, &Arc::new(Entry::once(handler.clone(), None))))
    }

    /// Adds a listener bound to `scope` that removes itself before its first
    /// run.
    ///
    /// The registration is matched by the original handler, so
    /// `off_with(event, handler, scope)` removes it before it fires.
    pub fn once_with(&self, event: &str, handler: &Handler<A>, scope: &Scope<A>) -> bool {
        self.register(
            event,
            &Arc::new(Entry::once(handler.clone(), Some(scope.clone()))),
        )
    }

    /// Removes an unbound listener.
    ///
    /// Returns `true` if a listener was removed.
    pub fn off(&self, event: &str, handler: &Handler<A>) -> bool {
        self.unregister(event, handler, None)
    }

    /// Removes a listener bound to `scope`.
    pub fn off_with(&self, event: &str, handler: &Handler<A>, scope: &Scope<A>) -> bool {
        self.unregister(event, handler, Some(scope))
    }

    /// Alias of [`off`](Self::off).
    pub fn un(&self, event: &str, handler: &Handler<A>) -> bool {
        self.off(event, handler)
    }

    /// Registers every entry of `manifest` and returns a [`Token`] that
    /// removes exactly those registrations.
    ///
    /// Entries named by a reserved key are skipped. Duplicates of existing
    /// registrations are not added and not recorded in the token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnboundMethod`] if the manifest has no scope and
    /// contains a [`Handler::Method`]. Nothing is registered in that case.
    pub fn listen(&self, manifest: &Manifest<A>) -> Result<Token<A>> {
        let reserved = &self.shared.config.reserved;
        let scope = manifest.scope();

        for (event, handler) in manifest.iter() {
            if !reserved.contains(event) {
                Self::ensure_bound(event, handler, scope)?;
            }
        }

        let mut token = Token::new(Arc::clone(&self.shared));
        for (event, handler) in manifest.iter() {
            if reserved.contains(event) {
                tracing::debug!(key = %event, "Skipping reserved manifest key");
                continue;
            }
            let entry = Arc::new(Entry::new(handler.clone(), scope.cloned()));
            if self.register(event, &entry) {
                token.record(event, entry);
            }
        }
        Ok(token)
    }

    /// Removes every entry of `manifest`, matched by handler and the
    /// manifest's scope.
    ///
    /// Returns the number of listeners removed.
    pub fn unlisten(&self, manifest: &Manifest<A>) -> usize {
        let reserved = &self.shared.config.reserved;
        let scope = manifest.scope();
        let mut removed = 0;
        for (event, handler) in manifest.iter() {
            if !reserved.contains(event) && self.unregister(event, handler, scope) {
                removed += 1;
            }
        }
        removed
    }

    /// Removes all listeners of `event`, or of every event when `None`.
    ///
    /// The unwatch hook runs once per event that had listeners.
    pub fn un_all(&self, event: Option<&str>) {
        let Some(map) = self.map() else {
            return;
        };
        match event {
            Some(event) => {
                let outcome = map.clear(event);
                self.notify(event, outcome);
            }
            None => {
                for event in map.clear_all() {
                    self.notify(&event, Outcome::Unwatched);
                }
            }
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Invokes every listener of `event` in registration order, then every
    /// relay.
    ///
    /// Returns [`Flow::Stop`] if a listener returned it; the remaining
    /// listeners and all relays are skipped in that case. A relay returning
    /// [`Flow::Stop`] only skips the remaining relays and is not reported.
    pub fn fire(&self, event: &str, args: &A) -> Flow {
        tracing::trace!(event = %event, "Firing event");

        let stopped = match self.map().and_then(|map| map.snapshot(event)) {
            None => false,
            Some(Snapshot::Single(entry)) => self.dispatch(event, &entry, args).is_stop(),
            Some(Snapshot::Multi(list)) => list
                .items()
                .iter()
                .any(|entry| self.dispatch(event, entry, args).is_stop()),
        };

        if stopped {
            tracing::trace!(event = %event, "Dispatch stopped by listener");
            return Flow::Stop;
        }

        self.forward(event, args);
        Flow::Continue
    }

    /// Alias of [`fire`](Self::fire).
    pub fn emit(&self, event: &str, args: &A) -> Flow {
        self.fire(event, args)
    }

    fn dispatch(&self, event: &str, entry: &Arc<Entry<A>>, args: &A) -> Flow {
        if entry.is_once() {
            if !entry.claim() {
                return Flow::Continue;
            }
            self.unregister(event, &entry.handler, entry.scope.as_ref());
        }

        let flow = match self.shared.config.failure_policy {
            FailurePolicy::Propagate => entry.call(event, args),
            FailurePolicy::Isolate => panic::catch_unwind(AssertUnwindSafe(|| entry.call(event, args)))
                .unwrap_or_else(|payload| {
                    tracing::error!(
                        event = %event,
                        panic = %panic_message(payload.as_ref()),
                        "Listener panicked, continuing dispatch"
                    );
                    Flow::Continue
                }),
        };

        // A once listener cannot stop dispatch
        if entry.is_once() {
            Flow::Continue
        } else {
            flow
        }
    }

    // =========================================================================
    // Reflection
    // =========================================================================

    /// Returns `true` if `event` has at least one listener.
    #[must_use]
    pub fn has_listeners(&self, event: &str) -> bool {
        self.map().is_some_and(|map| map.contains(event))
    }

    /// Returns the number of listeners of `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.map().map_or(0, |map| map.len(event))
    }

    /// Returns the events that currently have listeners, sorted.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.map().map_or_else(Vec::new, |map| map.events())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl<A: ?Sized + 'static> Default for Watchable<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ?Sized + 'static> fmt::Debug for Watchable<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watchable")
            .field("events", &self.events())
            .field("relay_count", &self.relay_count())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}
