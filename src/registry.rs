//! The process-wide dependency registry and the public operation surface.
//!
//! The registry lives behind a thread-local singleton rather than being a
//! value callers construct and thread through their own types: the wrapper
//! types this engine serves are scattered across a program and cannot all be
//! changed to carry a handle to a shared registry. A [`std::thread::LocalKey`]
//! gives us the guard the design calls for without any extra bookkeeping --
//! `LocalKey::try_with` returns an error both during the thread-local's own
//! (re-entrant) initialization and after it has been torn down at thread
//! exit, which is exactly the "before construction" / "after destruction"
//! no-op window the engine must tolerate.

use std::cell::RefCell;
use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::dependency::{DepId, Dependency};
use crate::kind::Kind;
use crate::object::Object;
use crate::Address;
use crate::{list, splay};

/// The dependency graph: one [`Object`] per registered address, one
/// [`Dependency`] per recorded edge.
pub(crate) struct Registry {
    objects: FxHashMap<Address, Object>,
    deps: SlotMap<DepId, Dependency>,
}

impl Registry {
    fn new() -> Self {
        Self {
            objects: FxHashMap::default(),
            deps: SlotMap::with_key(),
        }
    }

    fn is_invalid(&self, addr: Address) -> bool {
        self.objects.get(&addr).map_or(false, |o| !o.valid)
    }

    fn lookup_or_create(&mut self, addr: Address) {
        self.objects.entry(addr).or_insert_with(Object::new);
    }

    fn incoming_head(&self, addr: Address, kind: Kind) -> Option<DepId> {
        self.objects.get(&addr).and_then(|o| match kind {
            Kind::Existence => o.incoming_exist,
            Kind::Content => o.incoming_content,
        })
    }

    fn set_incoming_head(&mut self, addr: Address, kind: Kind, head: Option<DepId>) {
        if let Some(obj) = self.objects.get_mut(&addr) {
            match kind {
                Kind::Existence => obj.incoming_exist = head,
                Kind::Content => obj.incoming_content = head,
            }
        }
    }

    /// Unlink every outgoing edge of `addr` from its target's incoming list
    /// and free it. Leaves `addr` with an empty outgoing tree.
    fn drop_outgoing(&mut self, addr: Address) {
        let Some(mut root) = self.objects.get(&addr).map(|o| o.outgoing) else {
            return;
        };
        let ids = splay::drain_tree(&self.deps, &mut root);
        if let Some(obj) = self.objects.get_mut(&addr) {
            obj.outgoing = root;
        }

        for id in ids {
            let (target, kind) = {
                let d = &self.deps[id];
                (d.target, d.kind)
            };
            let mut head = self.incoming_head(target, kind);
            list::unlink(&mut self.deps, &mut head, id);
            self.set_incoming_head(target, kind, head);
            self.deps.remove(id);
        }
    }

    /// Drain `addr`'s content-incoming list, and its existence-incoming list
    /// too if `full`, queuing every uncovered dependent for invalidation.
    fn drain_incoming_into(&mut self, addr: Address, full: bool, queue: &mut VecDeque<Address>) {
        let kinds: &[Kind] = if full {
            &[Kind::Content, Kind::Existence]
        } else {
            &[Kind::Content]
        };
        for &kind in kinds {
            let mut head = self.incoming_head(addr, kind);
            let ids = list::drain(&mut self.deps, &mut head);
            self.set_incoming_head(addr, kind, head);
            for id in ids {
                queue.push_back(self.deps[id].source);
            }
        }
    }

    /// Invalidate every address reachable from `seeds` through an incoming
    /// dependency edge. An explicit work queue stands in for recursion, so a
    /// long dependency chain cannot overflow the stack; an address already
    /// invalid when it is popped is skipped, which is what makes it safe for
    /// the same edge to surface in the queue more than once.
    ///
    /// Every hop past the seeds is content-only: a seed becomes invalid
    /// because *it* was destroyed or modified, but everything reached from it
    /// transitively becomes invalid only because a dependency it held turned
    /// out to be unsound, which is exactly what a content dependency means.
    /// An existence-only dependent of a seed's dependent must not be dragged
    /// in by that second hop. The `full` (both incoming lists) treatment is
    /// reserved for a destroyed address itself, and is applied by the caller
    /// before the seeds reach this function (see `mark_destroyed`).
    fn invalidate_all(&mut self, seeds: Vec<Address>) {
        let mut queue: VecDeque<Address> = seeds.into();
        while let Some(addr) = queue.pop_front() {
            let Some(obj) = self.objects.get(&addr) else {
                continue;
            };
            if !obj.valid {
                continue;
            }
            self.objects.get_mut(&addr).unwrap().valid = false;
            tracing::debug!(?addr, "object invalidated");

            self.drain_incoming_into(addr, false, &mut queue);
            self.drop_outgoing(addr);
        }
    }

    /// Record a dependency edge `source -> target` of the given `kind`,
    /// upgrading an existing existence edge in place if `kind` is `Content`.
    fn add_edge(&mut self, source: Address, target: Address, kind: Kind) {
        if self.is_invalid(source) {
            tracing::trace!(?source, ?target, ?kind, "ignoring dependency from invalid source");
            return;
        }

        if kind == Kind::Content && self.is_invalid(target) {
            self.lookup_or_create(source);
            self.invalidate_all(vec![source]);
            return;
        }

        self.lookup_or_create(source);

        let mut root = self.objects[&source].outgoing;
        let found = splay::find_and_splay(&mut self.deps, &mut root, target);
        self.objects.get_mut(&source).unwrap().outgoing = root;

        match found {
            Some(id) if self.deps[id].kind == Kind::Existence && kind == Kind::Content => {
                let mut exist_head = self.incoming_head(target, Kind::Existence);
                list::unlink(&mut self.deps, &mut exist_head, id);
                self.set_incoming_head(target, Kind::Existence, exist_head);

                self.deps[id].kind = Kind::Content;

                let mut content_head = self.incoming_head(target, Kind::Content);
                list::push_front(&mut self.deps, &mut content_head, id);
                self.set_incoming_head(target, Kind::Content, content_head);

                tracing::debug!(?source, ?target, "upgraded dependency from existence to content");
            }
            Some(_) => {
                // Edge already exists at this strength or higher; nothing to do.
            }
            None => {
                let id = self.deps.insert(Dependency::new(source, target, kind));
                let mut root = self.objects[&source].outgoing;
                splay::insert_new(&mut self.deps, &mut root, id);
                self.objects.get_mut(&source).unwrap().outgoing = root;

                self.lookup_or_create(target);
                let mut head = self.incoming_head(target, kind);
                list::push_front(&mut self.deps, &mut head, id);
                self.set_incoming_head(target, kind, head);

                tracing::trace!(?source, ?target, ?kind, "added dependency");
            }
        }
    }

    fn mark_modified(&mut self, addr: Address) {
        if !self.objects.contains_key(&addr) {
            return;
        }
        let mut queue = VecDeque::new();
        self.drain_incoming_into(addr, false, &mut queue);
        tracing::debug!(?addr, dependents = queue.len(), "content modified, cascading to dependents");
        self.invalidate_all(queue.into_iter().collect());
    }

    fn mark_destroyed(&mut self, addr: Address) {
        if !self.objects.contains_key(&addr) {
            return;
        }
        // `addr` itself is destroyed, not merely invalidated, so both of its
        // incoming lists are drained directly here: an existence-dependent of
        // `addr` must be invalidated by `addr`'s destruction just as much as a
        // content-dependent is. Everything queued from here on, though, is
        // only ever invalidated by a dependency of its own turning out bad,
        // so `invalidate_all` takes it from here content-only.
        let mut queue = VecDeque::new();
        self.drain_incoming_into(addr, true, &mut queue);
        self.drop_outgoing(addr);
        self.objects.remove(&addr);
        tracing::info!(?addr, "object destroyed");
        self.invalidate_all(queue.into_iter().collect());
    }

    fn reset(&mut self, addr: Address) {
        if !self.objects.contains_key(&addr) {
            return;
        }
        self.drop_outgoing(addr);
        self.objects.get_mut(&addr).unwrap().valid = true;
        tracing::trace!(?addr, "reset to valid with no outgoing dependencies");
    }

    fn propagate_invalid(&mut self, dest: Address, src: Address) {
        if self.is_invalid(src) {
            self.lookup_or_create(dest);
            self.invalidate_all(vec![dest]);
        }
    }

    fn propagate_content(&mut self, dest: Address, src: Address) {
        self.propagate_invalid(dest, src);

        let src_outgoing = self.objects.get(&src).map_or(None, |o| o.outgoing);
        let targets = splay::targets_by_kind(&self.deps, src_outgoing, Kind::Content);
        for target in targets {
            self.add_edge(dest, target, Kind::Content);
        }
    }

    #[cfg(feature = "serde")]
    fn build_snapshot(&self) -> crate::snapshot::Snapshot {
        use crate::snapshot::{EdgeSnapshot, ObjectSnapshot, Snapshot};

        let objects = self
            .objects
            .iter()
            .map(|(&address, obj)| {
                let mut outgoing = Vec::new();
                for kind in [Kind::Existence, Kind::Content] {
                    let targets = splay::targets_by_kind(&self.deps, obj.outgoing, kind);
                    outgoing.extend(targets.into_iter().map(|target| EdgeSnapshot {
                        target,
                        content: kind == Kind::Content,
                    }));
                }
                ObjectSnapshot {
                    address,
                    valid: obj.valid,
                    outgoing,
                }
            })
            .collect();

        Snapshot { objects }
    }
}

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::new());
}

/// Run `f` against the live registry, unless the engine is unavailable
/// because the thread-local has not yet finished constructing (re-entrant
/// access during its own initialization) or has already been torn down
/// (thread exit). Every public operation is a silent no-op in either case.
fn with_registry<R>(f: impl FnOnce(&mut Registry) -> R) -> Option<R> {
    REGISTRY.try_with(|cell| f(&mut cell.borrow_mut())).ok()
}

/// If `addr` is registered and invalid, invoke the violation handler with it.
///
/// A no-op if `addr` has never been registered, has been destroyed, or the
/// engine is unavailable.
pub fn validate(addr: Address) {
    let invalid = with_registry(|r| r.is_invalid(addr)).unwrap_or(false);
    if invalid {
        crate::violation::invoke_violation_handler(addr);
    }
}

/// Record that `source` depends on the *existence* of `target`: `source`
/// becomes invalid when `target` is destroyed.
pub fn add_dependency(source: Address, target: Address) {
    with_registry(|r| r.add_edge(source, target, Kind::Existence));
}

/// Record that `source` depends on the *content* of `target`: `source`
/// becomes invalid when `target` is destroyed or modified.
///
/// Subsumes an existing existence dependency between the same pair: calling
/// this after [`add_dependency`] upgrades the edge in place instead of
/// recording a second one.
pub fn add_content_dependency(source: Address, target: Address) {
    with_registry(|r| r.add_edge(source, target, Kind::Content));
}

/// Notify the engine that `target`'s content changed. Every object with a
/// content dependency on `target`, transitively, becomes invalid; `target`
/// itself stays valid and its own outgoing dependencies are untouched.
pub fn mark_modified(target: Address) {
    with_registry(|r| r.mark_modified(target));
}

/// Notify the engine that `target` has been destroyed. Every dependent,
/// transitively, through either dependency kind, becomes invalid, and
/// `target`'s record is removed from the registry.
///
/// Idempotent: a second call naming an already-destroyed (or never
/// registered) address is a no-op.
pub fn mark_destroyed(target: Address) {
    with_registry(|r| r.mark_destroyed(target));
}

/// Drop all of `addr`'s outgoing dependencies and mark it valid again.
/// `addr`'s incoming dependencies (what depends on it) are untouched.
///
/// A no-op if `addr` has never been registered.
pub fn reset(addr: Address) {
    with_registry(|r| r.reset(addr));
}

/// If `src` is currently invalid, mark `dest` invalid too; otherwise a no-op.
///
/// Intended for copy-construction and assignment on wrapper types: `dest`
/// inherits whatever broken state `src` was already in, without acquiring
/// any dependency of its own.
pub fn propagate_invalid(dest: Address, src: Address) {
    with_registry(|r| r.propagate_invalid(dest, src));
}

/// Like [`propagate_invalid`], but additionally re-issues every content
/// dependency `src` currently has as a content dependency of `dest`: if `src`
/// depended on the content of some `x`, so does `dest` after the call.
pub fn propagate_content(dest: Address, src: Address) {
    with_registry(|r| r.propagate_content(dest, src));
}

/// Capture a read-only snapshot of the current registry state: every
/// registered address, its validity, and its outgoing dependencies.
///
/// Intended for debugging and test fixtures; there is no corresponding way to
/// load a snapshot back into the engine; see [`crate::snapshot`].
#[cfg(feature = "serde")]
pub fn snapshot() -> Option<crate::snapshot::Snapshot> {
    with_registry(|r| r.build_snapshot())
}

/// Reset the engine to a pristine state: an empty registry and the default
/// violation/spatial handlers.
///
/// Exists only for test harnesses. The registry is a thread-local singleton
/// rather than a value tests construct, and `cargo test`'s default runner
/// reuses OS threads across `#[test]` functions, so without this each test
/// would observe whatever state a previous test left on the same thread.
#[doc(hidden)]
pub fn __reset_for_tests() {
    let _ = REGISTRY.try_with(|cell| *cell.borrow_mut() = Registry::new());
    crate::violation::__reset_handlers_for_tests();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Registry {
        Registry::new()
    }

    #[test]
    fn add_dependency_is_idempotent() {
        let mut r = fresh();
        let a = Address::from_raw(1);
        let b = Address::from_raw(2);
        r.add_edge(a, b, Kind::Existence);
        r.add_edge(a, b, Kind::Existence);
        assert_eq!(r.deps.len(), 1);
    }

    #[test]
    fn content_dependency_upgrades_existing_existence_edge() {
        let mut r = fresh();
        let a = Address::from_raw(1);
        let b = Address::from_raw(2);
        r.add_edge(a, b, Kind::Existence);
        r.add_edge(a, b, Kind::Content);
        assert_eq!(r.deps.len(), 1);
        let (_, dep) = r.deps.iter().next().unwrap();
        assert_eq!(dep.kind, Kind::Content);
        assert_eq!(r.incoming_head(b, Kind::Existence), None);
        assert!(r.incoming_head(b, Kind::Content).is_some());

        // Re-adding as existence afterward must not downgrade it.
        r.add_edge(a, b, Kind::Existence);
        let (_, dep) = r.deps.iter().next().unwrap();
        assert_eq!(dep.kind, Kind::Content);
    }

    #[test]
    fn mark_destroyed_invalidates_existence_dependents() {
        let mut r = fresh();
        let a = Address::from_raw(1);
        let b = Address::from_raw(2);
        r.add_edge(a, b, Kind::Existence);
        r.mark_destroyed(b);
        assert!(r.is_invalid(a));
        assert!(!r.objects.contains_key(&b));
        assert_eq!(r.deps.len(), 0, "a's outgoing edge must be freed too");
    }

    #[test]
    fn mark_modified_invalidates_content_dependents_only() {
        let mut r = fresh();
        let a = Address::from_raw(1);
        let b = Address::from_raw(2);
        r.add_edge(a, b, Kind::Content);
        r.mark_modified(b);
        assert!(r.is_invalid(a));
        assert!(!r.is_invalid(b));
    }

    #[test]
    fn reset_clears_outgoing_and_revalidates() {
        let mut r = fresh();
        let a = Address::from_raw(1);
        let b = Address::from_raw(2);
        r.add_edge(a, b, Kind::Existence);
        r.mark_destroyed(b);
        assert!(r.is_invalid(a));
        r.reset(a);
        assert!(!r.is_invalid(a));
    }

    #[test]
    fn mark_destroyed_is_idempotent() {
        let mut r = fresh();
        let b = Address::from_raw(1);
        r.mark_destroyed(b);
        r.mark_destroyed(b); // must not panic
        assert!(!r.objects.contains_key(&b));
    }

    #[test]
    fn invalid_source_does_not_acquire_new_dependency() {
        let mut r = fresh();
        let a = Address::from_raw(1);
        let b = Address::from_raw(2);
        let c = Address::from_raw(3);
        r.add_edge(a, b, Kind::Existence);
        r.mark_destroyed(b);
        assert!(r.is_invalid(a));

        r.add_edge(a, c, Kind::Existence);
        assert_eq!(r.objects.get(&a).unwrap().outgoing, None);
    }

    #[test]
    fn content_cascade_propagates_two_hops() {
        // add-content-dependency(a,b); add-content-dependency(c,a); mark-destroyed(b)
        // invalidates a (existence cascade via b's destruction), which is
        // itself a content modification from c's perspective.
        let mut r = fresh();
        let a = Address::from_raw(1);
        let b = Address::from_raw(2);
        let c = Address::from_raw(3);
        r.add_edge(a, b, Kind::Content);
        r.add_edge(c, a, Kind::Content);
        r.mark_destroyed(b);
        assert!(r.is_invalid(a));
        assert!(r.is_invalid(c));
    }

    #[test]
    fn mark_modified_cascade_does_not_reach_an_existence_dependent_of_a_dependent() {
        // add-content-dependency(s,b); add-dependency(t,s); mark-modified(b):
        // s is invalidated by b's content change, but t only depends on s's
        // existence, which is unaffected, so t must stay valid.
        let mut r = fresh();
        let s = Address::from_raw(1);
        let b = Address::from_raw(2);
        let t = Address::from_raw(3);
        r.add_edge(s, b, Kind::Content);
        r.add_edge(t, s, Kind::Existence);

        r.mark_modified(b);

        assert!(r.is_invalid(s));
        assert!(!r.is_invalid(t), "t depends on s's existence, not its content");
    }

    #[test]
    fn mark_destroyed_cascade_does_not_reach_an_existence_dependent_of_a_dependent() {
        // add-content-dependency(a,b); add-dependency(t,a); mark-destroyed(b):
        // a is invalidated (not destroyed) by b's destruction, so t, which
        // only depends on a's existence, must stay valid.
        let mut r = fresh();
        let a = Address::from_raw(1);
        let b = Address::from_raw(2);
        let t = Address::from_raw(3);
        r.add_edge(a, b, Kind::Content);
        r.add_edge(t, a, Kind::Existence);

        r.mark_destroyed(b);

        assert!(r.is_invalid(a));
        assert!(!r.is_invalid(t), "t depends on a's existence, not its content");
    }

    #[test]
    fn propagate_content_copies_content_edges_not_existence_edges() {
        let mut r = fresh();
        let dest = Address::from_raw(1);
        let src = Address::from_raw(2);
        let content_target = Address::from_raw(3);
        let existence_target = Address::from_raw(4);

        r.add_edge(src, content_target, Kind::Content);
        r.add_edge(src, existence_target, Kind::Existence);
        r.propagate_content(dest, src);

        let mut root = r.objects.get(&dest).map_or(None, |o| o.outgoing);
        assert!(splay::find_and_splay(&mut r.deps, &mut root, content_target).is_some());
        assert!(splay::find_and_splay(&mut r.deps, &mut root, existence_target).is_none());

        // Modifying content_target must now invalidate dest too.
        r.mark_modified(content_target);
        assert!(r.is_invalid(dest));
    }

    #[test]
    fn propagate_invalid_copies_current_invalidity_only() {
        let mut r = fresh();
        let dest = Address::from_raw(1);
        let src = Address::from_raw(2);

        r.propagate_invalid(dest, src);
        assert!(
            !r.objects.contains_key(&dest),
            "src was never registered, so dest should not be either"
        );

        r.mark_destroyed(src);
        let dest2 = Address::from_raw(3);
        r.propagate_invalid(dest2, src);
        assert!(r.is_invalid(dest2));
    }
}
