// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Turning arbitrary types into event sources.
//!
//! Any type becomes an event source by embedding a [`Watchable`] and
//! implementing [`Observable`]; every method of the contract then comes for
//! free. The module-level helpers ([`unify`], [`all_off`],
//! [`has_listeners`], [`is_watchable`]) work on any such type.
//!
//! # Examples
//!
//! ```
//! use watchable::{Handler, Observable, Watchable};
//!
//! struct Document {
//!     title: String,
//!     events: Watchable<str>,
//! }
//!
//! impl Observable<str> for Document {
//!     fn watchable(&self) -> &Watchable<str> {
//!         &self.events
//!     }
//! }
//!
//! let doc = Document { title: "notes".into(), events: Watchable::new() };
//! doc.on("rename", &Handler::new(|name: &str| println!("renamed to {name}")))?;
//! doc.fire("rename", &doc.title);
//! # Ok::<(), watchable::Error>(())
//! ```

use std::any::Any;
use std::sync::Arc;

use crate::error::Result;
use crate::manifest::Manifest;
use crate::relay::{RelayHandle, RelayOptions};
use crate::token::Token;
use crate::watchable::Watchable;
use crate::watcher::{Flow, Handler, Outcome, Scope, WatcherMap};

/// Trait for types that act as event sources.
///
/// Implementors only provide [`watchable`](Self::watchable); all other
/// methods delegate to it.
pub trait Observable<A: ?Sized + 'static> {
    /// The embedded event source.
    fn watchable(&self) -> &Watchable<A>;

    /// See [`Watchable::on`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnboundMethod`](crate::Error::UnboundMethod) for a
    /// method handler.
    fn on(&self, event: &str, handler: &Handler<A>) -> Result<bool> {
        self.watchable().on(event, handler)
    }

    /// See [`Watchable::on_with`].
    fn on_with(&self, event: &str, handler: &Handler<A>, scope: &Scope<A>) -> bool {
        self.watchable().on_with(event, handler, scope)
    }

    /// See [`Watchable::once`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnboundMethod`](crate::Error::UnboundMethod) for a
    /// method handler.
    fn once(&self, event: &str, handler: &Handler<A>) -> Result<bool> {
        self.watchable().once(event, handler)
    }

    /// See [`Watchable::once_with`].
    fn once_with(&self, event: &str, handler: &Handler<A>, scope: &Scope<A>) -> bool {
        self.watchable().once_with(event, handler, scope)
    }

    /// See [`Watchable::off`].
    fn off(&self, event: &str, handler: &Handler<A>) -> bool {
        self.watchable().off(event, handler)
    }

    /// See [`Watchable::off_with`].
    fn off_with(&self, event: &str, handler: &Handler<A>, scope: &Scope<A>) -> bool {
        self.watchable().off_with(event, handler, scope)
    }

    /// See [`Watchable::listen`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnboundMethod`](crate::Error::UnboundMethod) if the
    /// manifest has no scope and contains a method handler.
    fn listen(&self, manifest: &Manifest<A>) -> Result<Token<A>> {
        self.watchable().listen(manifest)
    }

    /// See [`Watchable::unlisten`].
    fn unlisten(&self, manifest: &Manifest<A>) -> usize {
        self.watchable().unlisten(manifest)
    }

    /// See [`Watchable::fire`].
    fn fire(&self, event: &str, args: &A) -> Flow {
        self.watchable().fire(event, args)
    }

    /// See [`Watchable::emit`].
    fn emit(&self, event: &str, args: &A) -> Flow {
        self.watchable().emit(event, args)
    }

    /// See [`Watchable::has_listeners`].
    fn has_listeners(&self, event: &str) -> bool {
        self.watchable().has_listeners(event)
    }

    /// See [`Watchable::relay_events`].
    fn relay_events(&self, target: &Watchable<A>, options: RelayOptions<A>) -> RelayHandle<A> {
        self.watchable().relay_events(target, options)
    }

    /// See [`Watchable::un_all`].
    fn un_all(&self, event: Option<&str>) {
        self.watchable().un_all(event);
    }
}

impl<A: ?Sized + 'static> Observable<A> for Watchable<A> {
    fn watchable(&self) -> &Watchable<A> {
        self
    }
}

/// Makes two sources share one listener map from now on.
///
/// - Neither has a map: both get the same new, empty map.
/// - Only one has a map: the other adopts it.
/// - Both have distinct maps: `b`'s listeners are merged into `a`'s map,
///   then `b` switches to it. Events `a` had no listeners for take `b`'s
///   listeners as they are, and `a`'s watch hook runs for each. Events both
///   had listeners for get `a`'s listeners followed by `b`'s, with no
///   duplicate suppression.
///
/// # Examples
///
/// ```
/// use watchable::{unify, Handler, Watchable};
///
/// let a = Watchable::<u32>::new();
/// let b = Watchable::<u32>::new();
/// b.on("tick", &Handler::new(|_: &u32| {}))?;
///
/// unify(&a, &b);
/// assert!(a.has_listeners("tick"));
/// assert!(a.shares_map_with(&b));
/// # Ok::<(), watchable::Error>(())
/// ```
pub fn unify<A, X, Y>(a: &X, b: &Y)
where
    A: ?Sized + 'static,
    X: Observable<A> + ?Sized,
    Y: Observable<A> + ?Sized,
{
    let (a, b) = (a.watchable(), b.watchable());

    match (a.map(), b.map()) {
        (None, None) => {
            let map = Arc::new(WatcherMap::new());
            a.set_map(Arc::clone(&map));
            b.set_map(map);
        }
        (None, Some(theirs)) => a.set_map(theirs),
        (Some(mine), None) => b.set_map(mine),
        (Some(mine), Some(theirs)) => {
            if !Arc::ptr_eq(&mine, &theirs) {
                for event in mine.merge(&theirs) {
                    a.notify(&event, Outcome::Watched);
                }
            }
            b.set_map(mine);
        }
    }
    tracing::debug!("Unified listener maps");
}

/// Removes all listeners of `event`, or of every event when `None`.
pub fn all_off<A, T>(source: &T, event: Option<&str>)
where
    A: ?Sized + 'static,
    T: Observable<A> + ?Sized,
{
    source.watchable().un_all(event);
}

/// Returns `true` if `event` has at least one listener on `source`.
#[must_use]
pub fn has_listeners<A, T>(source: &T, event: &str) -> bool
where
    A: ?Sized + 'static,
    T: Observable<A> + ?Sized,
{
    source.watchable().has_listeners(event)
}

/// Returns `true` if `value` is a bare [`Watchable<A>`].
///
/// Host types that embed a `Watchable` and implement [`Observable`] are not
/// recognized through `dyn Any`; use the `Observable<A>` bound for those.
#[must_use]
pub fn is_watchable<A: ?Sized + 'static>(value: &dyn Any) -> bool {
    value.is::<Watchable<A>>()
}
