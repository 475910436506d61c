// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handlers, scopes and the registration record that binds them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

/// Result of invoking a handler.
///
/// Returning [`Flow::Stop`] halts the remainder of the current `fire` call.
/// Handlers that return `()` are treated as [`Flow::Continue`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Flow {
    /// Keep dispatching.
    #[default]
    Continue,
    /// Stop dispatching for this `fire` call.
    Stop,
}

impl Flow {
    /// Returns `true` for [`Flow::Stop`].
    #[must_use]
    pub fn is_stop(self) -> bool {
        self == Self::Stop
    }
}

impl From<()> for Flow {
    fn from((): ()) -> Self {
        Self::Continue
    }
}

/// Type alias for the callable form of a handler.
pub type Callback<A> = Arc<dyn Fn(&A) -> Flow + Send + Sync>;

fn callback<A, F, R>(f: F) -> Callback<A>
where
    A: ?Sized + 'static,
    F: Fn(&A) -> R + Send + Sync + 'static,
    R: Into<Flow>,
{
    Arc::new(move |args: &A| f(args).into())
}

/// An event handler.
///
/// Handlers are compared by identity: two clones of the same `Callable`
/// handler are equal, two separately constructed closures never are.
/// `Method` handlers compare by name and are resolved against their scope
/// every time they run, so redefining the method on the scope after
/// registration is honored.
///
/// # Examples
///
/// ```
/// use watchable::{Handler, Watchable};
///
/// let source = Watchable::<u32>::new();
/// let handler = Handler::new(|value: &u32| println!("got {value}"));
///
/// source.on("tick", &handler)?;
/// source.fire("tick", &1);
///
/// // The same clone removes it again
/// assert!(source.off("tick", &handler));
/// # Ok::<(), watchable::Error>(())
/// ```
pub enum Handler<A: ?Sized> {
    /// A closure invoked directly with the event arguments.
    Callable(Callback<A>),
    /// A method name looked up on the bound scope at call time.
    Method(Arc<str>),
}

impl<A: ?Sized> Handler<A> {
    /// Creates a callable handler.
    pub fn new<F, R>(f: F) -> Self
    where
        A: 'static,
        F: Fn(&A) -> R + Send + Sync + 'static,
        R: Into<Flow>,
    {
        Self::Callable(callback(f))
    }

    /// Creates a handler resolved by name against the bound scope.
    pub fn method(name: impl Into<Arc<str>>) -> Self {
        Self::Method(name.into())
    }

    /// Returns `true` if both handlers have the same identity.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Callable(a), Self::Callable(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Self::Method(a), Self::Method(b)) => a == b,
            _ => false,
        }
    }

    /// Returns the method name for `Method` handlers.
    #[must_use]
    pub fn method_name(&self) -> Option<&str> {
        match self {
            Self::Method(name) => Some(name),
            Self::Callable(_) => None,
        }
    }
}

impl<A: ?Sized> Clone for Handler<A> {
    fn clone(&self) -> Self {
        match self {
            Self::Callable(f) => Self::Callable(Arc::clone(f)),
            Self::Method(name) => Self::Method(Arc::clone(name)),
        }
    }
}

impl<A: ?Sized> fmt::Debug for Handler<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callable(cb) => write!(f, "Callable({:p})", Arc::as_ptr(cb).cast::<()>()),
            Self::Method(name) => write!(f, "Method({name})"),
        }
    }
}

/// An object that named handlers are resolved against.
///
/// Returns `None` when the object has no method called `name`.
pub trait Context<A: ?Sized>: Send + Sync {
    /// Invokes the method called `name` with `args`.
    fn call_method(&self, name: &str, args: &A) -> Option<Flow>;
}

/// The binding context of a registration.
///
/// Scopes compare by identity of the underlying context object.
pub struct Scope<A: ?Sized>(Arc<dyn Context<A>>);

impl<A: ?Sized> Scope<A> {
    /// Wraps a context object.
    pub fn new<C>(context: C) -> Self
    where
        C: Context<A> + 'static,
    {
        Self(Arc::new(context))
    }

    /// Wraps a context object the caller keeps a handle to.
    pub fn shared<C>(context: Arc<C>) -> Self
    where
        C: Context<A> + 'static,
    {
        Self(context)
    }

    /// Returns `true` if both scopes refer to the same context object.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }

    pub(crate) fn call_method(&self, name: &str, args: &A) -> Option<Flow> {
        self.0.call_method(name, args)
    }
}

impl<A: ?Sized> Clone for Scope<A> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<A: ?Sized> fmt::Debug for Scope<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope({:p})", Arc::as_ptr(&self.0).cast::<()>())
    }
}

/// A context whose methods can be defined and redefined at runtime.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use watchable::{Handler, MethodTable, Scope, Watchable};
///
/// let table = Arc::new(MethodTable::<str>::new());
/// table.define("onGreet", |name: &str| println!("hello {name}"));
///
/// let source = Watchable::<str>::new();
/// source.on_with("greet", &Handler::method("onGreet"), &Scope::shared(Arc::clone(&table)));
///
/// // Redefining the method affects the existing registration
/// table.define("onGreet", |name: &str| println!("hi {name}"));
/// source.fire("greet", "world");
/// ```
pub struct MethodTable<A: ?Sized> {
    methods: RwLock<HashMap<String, Callback<A>>>,
}

impl<A: ?Sized> MethodTable<A> {
    /// Creates a table with no methods.
    #[must_use]
    pub fn new() -> Self {
        Self {
            methods: RwLock::new(HashMap::new()),
        }
    }

    /// Defines or replaces the method called `name`.
    pub fn define<F, R>(&self, name: impl Into<String>, f: F)
    where
        A: 'static,
        F: Fn(&A) -> R + Send + Sync + 'static,
        R: Into<Flow>,
    {
        self.methods.write().insert(name.into(), callback(f));
    }

    /// Removes the method called `name`.
    ///
    /// Returns `true` if it existed.
    pub fn remove(&self, name: &str) -> bool {
        self.methods.write().remove(name).is_some()
    }

    /// Returns `true` if a method called `name` is defined.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.methods.read().contains_key(name)
    }
}

impl<A: ?Sized> Default for MethodTable<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ?Sized> Context<A> for MethodTable<A> {
    fn call_method(&self, name: &str, args: &A) -> Option<Flow> {
        // The lock must not be held while the method runs: it may redefine itself.
        let method = self.methods.read().get(name).cloned()?;
        Some(method(args))
    }
}

impl<A: ?Sized> fmt::Debug for MethodTable<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods = self.methods.read();
        let mut names: Vec<_> = methods.keys().collect();
        names.sort();
        f.debug_struct("MethodTable").field("methods", &names).finish()
    }
}

/// A single registration: handler plus optional binding scope.
pub(crate) struct Entry<A: ?Sized> {
    pub(crate) handler: Handler<A>,
    pub(crate) scope: Option<Scope<A>>,
    /// `Some(spent)` for registrations made through `once`.
    once: Option<AtomicBool>,
}

impl<A: ?Sized> Entry<A> {
    pub(crate) fn new(handler: Handler<A>, scope: Option<Scope<A>>) -> Self {
        Self {
            handler,
            scope,
            once: None,
        }
    }

    pub(crate) fn once(handler: Handler<A>, scope: Option<Scope<A>>) -> Self {
        Self {
            handler,
            scope,
            once: Some(AtomicBool::new(false)),
        }
    }

    pub(crate) fn is_once(&self) -> bool {
        self.once.is_some()
    }

    /// Marks a once entry as spent. Returns `false` if it already ran.
    pub(crate) fn claim(&self) -> bool {
        self.once
            .as_ref()
            .is_none_or(|spent| !spent.swap(true, Ordering::AcqRel))
    }

    /// Identity match on the underlying handler and the scope.
    pub(crate) fn matches(&self, handler: &Handler<A>, scope: Option<&Scope<A>>) -> bool {
        self.handler.same(handler)
            && match (&self.scope, scope) {
                (Some(mine), Some(theirs)) => mine.same(theirs),
                (None, None) => true,
                _ => false,
            }
    }

    /// Runs the handler, resolving method names against the scope.
    pub(crate) fn call(&self, event: &str, args: &A) -> Flow {
        match &self.handler {
            Handler::Callable(f) => f(args),
            Handler::Method(name) => {
                let resolved = self
                    .scope
                    .as_ref()
                    .and_then(|scope| scope.call_method(name, args));
                resolved.unwrap_or_else(|| {
                    tracing::warn!(event = %event, method = %name, "Scope has no such method, skipping");
                    Flow::Continue
                })
            }
        }
    }
}

impl<A: ?Sized> fmt::Debug for Entry<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("handler", &self.handler)
            .field("scope", &self.scope)
            .field("once", &self.is_once())
            .finish()
    }
}
