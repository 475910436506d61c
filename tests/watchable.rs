// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for registration, dispatch, tokens and unify.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use watchable::{
    Flow, Handler, Manifest, MethodTable, Observable, RelayOptions, Scope, WatchHooks, Watchable,
    WatchableConfig, unify,
};

/// Records the order in which tagged handlers run.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<&'static str>>>);

impl Recorder {
    fn handler(&self, tag: &'static str) -> Handler<u32> {
        let log = Arc::clone(&self.0);
        Handler::new(move |_: &u32| log.lock().push(tag))
    }

    fn take(&self) -> Vec<&'static str> {
        std::mem::take(&mut *self.0.lock())
    }
}

#[derive(Default)]
struct TransitionHooks {
    watched: Mutex<Vec<String>>,
    unwatched: Mutex<Vec<String>>,
}

impl WatchHooks for TransitionHooks {
    fn on_event_watch(&self, event: &str) {
        self.watched.lock().push(event.to_string());
    }

    fn on_event_unwatch(&self, event: &str) {
        self.unwatched.lock().push(event.to_string());
    }
}

// ============================================================================
// Registration
// ============================================================================

mod registration {
    use super::*;

    #[test]
    fn second_listener_promotes_to_multi_in_order() {
        let source = Watchable::new();
        let rec = Recorder::default();

        source.on("E", &rec.handler("first")).unwrap();
        source.on("E", &rec.handler("second")).unwrap();

        source.fire("E", &0);
        assert_eq!(rec.take(), vec!["first", "second"]);
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let source = Watchable::new();
        let rec = Recorder::default();
        let handler = rec.handler("only");

        assert!(source.on("E", &handler).unwrap());
        assert!(!source.on("E", &handler).unwrap());
        assert!(source.has_listeners("E"));
        assert_eq!(source.listener_count("E"), 1);

        source.fire("E", &0);
        assert_eq!(rec.take(), vec!["only"]);
    }

    #[test]
    fn duplicate_scoped_registration_is_ignored() {
        let source = Watchable::<u32>::new();
        let scope = Scope::new(MethodTable::new());
        let handler = Handler::method("onE");

        assert!(source.on_with("E", &handler, &scope));
        assert!(!source.on_with("E", &handler, &scope));
        assert_eq!(source.listener_count("E"), 1);
    }

    #[test]
    fn hooks_run_once_per_transition() {
        let hooks = Arc::new(TransitionHooks::default());
        let source = Watchable::new().with_hooks(hooks.clone());
        let rec = Recorder::default();
        let first = rec.handler("first");
        let second = rec.handler("second");

        source.on("E", &first).unwrap();
        source.on("E", &second).unwrap();
        assert_eq!(*hooks.watched.lock(), vec!["E"]);

        source.off("E", &second);
        assert!(hooks.unwatched.lock().is_empty());
        source.off("E", &first);
        assert_eq!(*hooks.unwatched.lock(), vec!["E"]);
    }

    #[test]
    fn unlisten_removes_manifest_entries() {
        let source = Watchable::new();
        let rec = Recorder::default();
        let manifest = Manifest::new()
            .on("foo", rec.handler("foo"))
            .on("bar", rec.handler("bar"));

        source.listen(&manifest).unwrap();
        assert_eq!(source.unlisten(&manifest), 2);
        assert!(source.events().is_empty());
    }

    #[test]
    fn reserved_keys_are_skipped() {
        let config = WatchableConfig::default()
            .with_reserved_key("priority")
            .unwrap();
        let source = Watchable::with_config(config);
        let rec = Recorder::default();
        let manifest = Manifest::new()
            .on("priority", rec.handler("priority"))
            .on("scope", rec.handler("scope"))
            .on("foo", rec.handler("foo"));

        let token = source.listen(&manifest).unwrap();
        assert_eq!(token.len(), 1);
        assert_eq!(source.events(), vec!["foo"]);
    }

    #[test]
    fn manifest_with_unbound_method_registers_nothing() {
        let source = Watchable::<u32>::new();
        let manifest = Manifest::new()
            .on("foo", Handler::new(|_: &u32| {}))
            .on("bar", Handler::method("onBar"));

        assert!(source.listen(&manifest).is_err());
        assert!(!source.has_listeners("foo"));
    }
}

// ============================================================================
// Dispatch
// ============================================================================

mod dispatch {
    use super::*;

    #[test]
    fn removal_during_dispatch_uses_snapshot() {
        let source = Arc::new(Watchable::<u32>::new());
        let rec = Recorder::default();
        let b = rec.handler("B");
        let c = rec.handler("C");

        let weak = Arc::downgrade(&source);
        let removed = b.clone();
        let log = rec.clone();
        let a = Handler::new(move |_: &u32| {
            log.0.lock().push("A");
            if let Some(source) = weak.upgrade() {
                source.off("E", &removed);
            }
        });

        source.on("E", &a).unwrap();
        source.on("E", &b).unwrap();
        source.on("E", &c).unwrap();

        // The in-flight snapshot still holds B
        source.fire("E", &0);
        assert_eq!(rec.take(), vec!["A", "B", "C"]);

        source.fire("E", &0);
        assert_eq!(rec.take(), vec!["A", "C"]);
    }

    #[test]
    fn listener_added_during_dispatch_waits() {
        let source = Arc::new(Watchable::<u32>::new());
        let rec = Recorder::default();
        let d = rec.handler("D");

        let weak = Arc::downgrade(&source);
        let added = d.clone();
        let log = rec.clone();
        let a = Handler::new(move |_: &u32| {
            log.0.lock().push("A");
            if let Some(source) = weak.upgrade() {
                source.on("E", &added).unwrap();
            }
        });

        source.on("E", &a).unwrap();

        source.fire("E", &0);
        assert_eq!(rec.take(), vec!["A"]);

        source.fire("E", &0);
        assert_eq!(rec.take(), vec!["A", "D"]);
    }

    #[test]
    fn stop_halts_listeners_and_relays() {
        let source = Watchable::new();
        let target = Watchable::new();
        let rec = Recorder::default();

        source
            .on("E", &Handler::new(|_: &u32| Flow::Stop))
            .unwrap();
        source.on("E", &rec.handler("B")).unwrap();
        source.on("E", &rec.handler("C")).unwrap();
        target.on("E", &rec.handler("relayed")).unwrap();
        source.relay_events(&target, RelayOptions::All);

        assert_eq!(source.fire("E", &0), Flow::Stop);
        assert!(rec.take().is_empty());
    }

    #[test]
    fn stop_from_single_listener() {
        let source = Watchable::<u32>::new();
        source
            .on("E", &Handler::new(|v: &u32| if *v > 0 { Flow::Stop } else { Flow::Continue }))
            .unwrap();

        assert_eq!(source.fire("E", &0), Flow::Continue);
        assert_eq!(source.emit("E", &1), Flow::Stop);
        assert_eq!(source.fire("unknown", &1), Flow::Continue);
    }

    #[test]
    fn once_runs_exactly_once() {
        let source = Watchable::<u32>::new();
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        let handler = Handler::new(move |_: &u32| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        source.once("E", &handler).unwrap();
        source.fire("E", &0);
        assert!(!source.has_listeners("E"));
        source.fire("E", &0);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn once_among_other_listeners() {
        let source = Watchable::new();
        let rec = Recorder::default();

        source.on("E", &rec.handler("always")).unwrap();
        source.once("E", &rec.handler("once")).unwrap();

        source.fire("E", &0);
        source.fire("E", &0);
        assert_eq!(rec.take(), vec!["always", "once", "always"]);
    }

    #[test]
    fn late_bound_method_uses_current_definition() {
        let source = Watchable::<u32>::new();
        let table = Arc::new(MethodTable::<u32>::new());
        let rec = Recorder::default();

        let log = rec.clone();
        table.define("onE", move |_: &u32| log.0.lock().push("original"));
        source.on_with("E", &Handler::method("onE"), &Scope::shared(Arc::clone(&table)));

        let log = rec.clone();
        table.define("onE", move |_: &u32| log.0.lock().push("replacement"));

        source.fire("E", &0);
        assert_eq!(rec.take(), vec!["replacement"]);
    }

    #[test]
    fn recursive_fire_of_same_event() {
        let source = Arc::new(Watchable::<u32>::new());
        let count = Arc::new(AtomicU32::new(0));

        let weak = Arc::downgrade(&source);
        let c = Arc::clone(&count);
        source
            .on(
                "E",
                &Handler::new(move |depth: &u32| {
                    c.fetch_add(1, Ordering::SeqCst);
                    if *depth < 3 {
                        if let Some(source) = weak.upgrade() {
                            source.fire("E", &(depth + 1));
                        }
                    }
                }),
            )
            .unwrap();
        source.on("E", &Handler::new(|_: &u32| {})).unwrap();

        source.fire("E", &0);
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }
}

// ============================================================================
// Tokens
// ============================================================================

mod tokens {
    use super::*;

    #[test]
    fn destroy_removes_manifest_registrations() {
        let source = Watchable::<u32>::new();
        let table = Arc::new(MethodTable::<u32>::new());
        let rec = Recorder::default();

        let log = rec.clone();
        table.define("onFoo", move |_: &u32| log.0.lock().push("foo"));
        let log = rec.clone();
        table.define("onBar", move |_: &u32| log.0.lock().push("bar"));

        let scope = Scope::shared(Arc::clone(&table));
        let token = source
            .listen(
                &Manifest::new()
                    .with_scope(scope.clone())
                    .on("foo", Handler::method("onFoo"))
                    .on("bar", Handler::method("onBar")),
            )
            .unwrap();

        source.fire("foo", &0);
        source.fire("bar", &0);
        assert_eq!(rec.take(), vec!["foo", "bar"]);

        assert_eq!(token.destroy(), 2);
        source.fire("foo", &0);
        source.fire("bar", &0);
        assert!(rec.take().is_empty());
        assert!(!source.has_listeners("foo"));
        assert!(!source.has_listeners("bar"));
    }

    #[test]
    fn destroy_during_dispatch() {
        let source = Arc::new(Watchable::<u32>::new());
        let rec = Recorder::default();
        let token = Arc::new(
            source
                .listen(
                    &Manifest::new()
                        .on("E", rec.handler("tokened"))
                        .on("F", rec.handler("other")),
                )
                .unwrap(),
        );

        let t = Arc::clone(&token);
        let log = rec.clone();
        // Registered second so that "E" is a multi list while it destroys the token
        source
            .on(
                "E",
                &Handler::new(move |_: &u32| {
                    log.0.lock().push("destroyer");
                    t.destroy();
                }),
            )
            .unwrap();
        source.on("E", &rec.handler("last")).unwrap();

        source.fire("E", &0);
        assert_eq!(rec.take(), vec!["tokened", "destroyer", "last"]);

        source.fire("E", &0);
        assert_eq!(rec.take(), vec!["destroyer", "last"]);
        assert!(!source.has_listeners("F"));
    }

    #[test]
    fn destroy_after_unify() {
        let a = Watchable::new();
        let b = Watchable::new();
        let rec = Recorder::default();

        a.on("E", &rec.handler("a")).unwrap();
        let token = b.listen(&Manifest::new().on("E", rec.handler("b"))).unwrap();

        unify(&a, &b);
        assert_eq!(a.listener_count("E"), 2);

        assert_eq!(token.destroy(), 1);
        a.fire("E", &0);
        assert_eq!(rec.take(), vec!["a"]);
    }

    #[test]
    fn destroy_after_unify_and_source_dropped() {
        let a = Watchable::new();
        let b = Watchable::new();
        let rec = Recorder::default();

        let token = b.listen(&Manifest::new().on("F", rec.handler("b"))).unwrap();
        unify(&a, &b);
        drop(b);
        assert!(a.has_listeners("F"));

        assert_eq!(token.destroy(), 1);
        assert!(!a.has_listeners("F"));
        a.fire("F", &0);
        assert!(rec.take().is_empty());
    }

    #[test]
    fn removal_hook_runs_once_per_transition() {
        let hooks = Arc::new(TransitionHooks::default());
        let source = Watchable::new().with_hooks(hooks.clone());
        let rec = Recorder::default();

        let token = source
            .listen(
                &Manifest::new()
                    .on("E", rec.handler("e1"))
                    .on("F", rec.handler("f")),
            )
            .unwrap();
        source.on("E", &rec.handler("e2")).unwrap();

        // "E" keeps a listener, only "F" becomes empty
        assert_eq!(token.destroy(), 2);
        assert_eq!(*hooks.unwatched.lock(), vec!["F"]);

        assert_eq!(token.destroy(), 0);
        assert_eq!(*hooks.unwatched.lock(), vec!["F"]);

        source.once("G", &rec.handler("g")).unwrap();
        source.fire("G", &0);
        source.fire("G", &0);
        assert_eq!(rec.take(), vec!["g"]);
        assert_eq!(*hooks.unwatched.lock(), vec!["F", "G"]);
        assert_eq!(*hooks.watched.lock(), vec!["E", "F", "G"]);
    }
}

// ============================================================================
// Unify
// ============================================================================

mod unify_sources {
    use super::*;

    #[test]
    fn merged_listeners_fire_from_either_source() {
        let x = Watchable::new();
        let y = Watchable::new();
        let rec = Recorder::default();

        x.on("E", &rec.handler("L1")).unwrap();
        y.on("E", &rec.handler("L2")).unwrap();
        y.on("F", &rec.handler("L3")).unwrap();

        unify(&x, &y);

        x.fire("E", &0);
        assert_eq!(rec.take(), vec!["L1", "L2"]);
        y.fire("E", &0);
        assert_eq!(rec.take(), vec!["L1", "L2"]);
        x.fire("F", &0);
        assert_eq!(rec.take(), vec!["L3"]);
    }

    #[test]
    fn later_registrations_are_shared() {
        let x = Watchable::new();
        let y = Watchable::new();
        let rec = Recorder::default();
        x.on("E", &rec.handler("x")).unwrap();

        unify(&x, &y);
        y.on("G", &rec.handler("from y")).unwrap();

        x.fire("G", &0);
        assert_eq!(rec.take(), vec!["from y"]);
        assert_eq!(y.events(), vec!["E", "G"]);
    }

    #[test]
    fn unify_through_observable_types() {
        struct Panel {
            events: Watchable<u32>,
        }

        impl Observable<u32> for Panel {
            fn watchable(&self) -> &Watchable<u32> {
                &self.events
            }
        }

        let left = Panel {
            events: Watchable::new(),
        };
        let right = Panel {
            events: Watchable::new(),
        };
        let rec = Recorder::default();

        right.on("E", &rec.handler("right")).unwrap();
        unify(&left, &right);

        left.fire("E", &0);
        assert_eq!(rec.take(), vec!["right"]);
    }

    #[test]
    fn merge_while_dispatching() {
        let x = Arc::new(Watchable::<u32>::new());
        let y = Arc::new(Watchable::<u32>::new());
        let rec = Recorder::default();

        let (wx, wy) = (Arc::downgrade(&x), Arc::downgrade(&y));
        let log = rec.clone();
        x.on(
            "E",
            &Handler::new(move |_: &u32| {
                log.0.lock().push("merger");
                if let (Some(x), Some(y)) = (wx.upgrade(), wy.upgrade()) {
                    if !x.shares_map_with(&y) {
                        unify(&*x, &*y);
                    }
                }
            }),
        )
        .unwrap();
        x.on("E", &rec.handler("x2")).unwrap();
        y.on("E", &rec.handler("y")).unwrap();

        x.fire("E", &0);
        assert_eq!(rec.take(), vec!["merger", "x2"]);

        x.fire("E", &0);
        assert_eq!(rec.take(), vec!["merger", "x2", "y"]);
    }
}
