//! The external matching primitive.
//!
//! The engine never evaluates media features itself. It asks a [`MatchMedia`]
//! environment for a [`MediaQueryList`] per descriptor and observes it. In a
//! browser host this is `window.matchMedia`; headless hosts and tests use
//! [`VirtualMedia`](crate::VirtualMedia).

use crate::{Listener, ListenerId};
use std::rc::Rc;

/// A live, boolean-valued view of one media descriptor.
///
/// Implementations notify listeners with the new value whenever the
/// environment changes in a way that flips [`matches`](Self::matches).
pub trait MediaQueryList {
    /// The descriptor this list was created for.
    fn media(&self) -> &str;

    /// Whether the descriptor currently matches.
    fn matches(&self) -> bool;

    /// Subscribe to value transitions.
    fn add_listener(&self, listener: Listener<bool>) -> ListenerId;

    /// Unsubscribe. Returns `true` if the listener was registered.
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// Factory for [`MediaQueryList`]s: the only environment dependency of the engine.
pub trait MatchMedia {
    /// Create (or look up) the list observing `descriptor`.
    fn match_media(&self, descriptor: &str) -> Rc<dyn MediaQueryList>;
}
