//! Listener plumbing shared by conditions, rule lists and environments.
//!
//! Every observable in this crate stores its callbacks in a [`ListenerSet`].
//! Dispatch works on a snapshot of the registered callbacks, so a listener may
//! add or remove listeners (including itself) while it runs. A panicking
//! listener is isolated: the panic is caught, reported via `tracing`, and
//! delivery continues with the next listener.

use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A shared, type-erased callback receiving an event of type `E`.
pub type Listener<E> = Rc<dyn Fn(&E)>;

/// Opaque handle identifying one registered listener.
///
/// Handles are unique for the lifetime of the process, so removing a handle
/// from an observable it was never registered with is a harmless no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocate a fresh, process-unique handle.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ordered set of listeners with isolated, re-entrancy-safe dispatch.
///
/// # INV: registration order
///
/// Listeners are invoked in the order they were added.
pub struct ListenerSet<E: ?Sized> {
    entries: RefCell<Vec<(ListenerId, Listener<E>)>>,
}

impl<E: ?Sized> ListenerSet<E> {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }

    /// Register a listener and return its handle.
    pub fn add(&self, listener: Listener<E>) -> ListenerId {
        let id = ListenerId::next();
        self.entries.borrow_mut().push((id, listener));
        id
    }

    /// Remove a listener. Returns `true` if it was registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns `true` if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Drop every registered listener.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// Invoke every listener with `event`.
    ///
    /// Returns the number of listeners that panicked. Panics never escape:
    /// each one is logged and the remaining listeners still run.
    pub fn dispatch(&self, event: &E) -> usize {
        let snapshot: Vec<(ListenerId, Listener<E>)> = self
            .entries
            .borrow()
            .iter()
            .map(|(id, listener)| (*id, Rc::clone(listener)))
            .collect();

        let mut failed = 0;
        for (id, listener) in snapshot {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(event)));
            if let Err(payload) = outcome {
                failed += 1;
                tracing::warn!(
                    listener = %id,
                    reason = panic_message(payload.as_ref()),
                    "listener panicked during dispatch, continuing with remaining listeners"
                );
            }
        }
        failed
    }
}

impl<E: ?Sized> Default for ListenerSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ?Sized> fmt::Debug for ListenerSet<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
