//! Process-wide page-visibility state.
//!
//! A single flag records whether the host page is hidden. It is written
//! in exactly two places: once by [`install`] when it reads the source's
//! current state, and afterwards only by the change subscription that
//! `install` registers. Everything else reads it through an accessor.
//! Hosts without a visibility concept (servers, CLIs) never call
//! [`install`] and the flag stays at its visible default.

use std::sync::atomic::{AtomicBool, Ordering};

/// Visibility state of the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// The page is in the foreground.
    Visible,
    /// The page is backgrounded or being unloaded.
    Hidden,
}

/// Callback invoked by a [`VisibilitySource`] on every state change.
pub type VisibilityListener = Box<dyn Fn(Visibility) + Send + Sync>;

/// Host-supplied source of page-visibility state.
pub trait VisibilitySource {
    /// Current visibility state.
    fn visibility(&self) -> Visibility;

    /// Registers a callback fired on every visibility change. There is no
    /// unsubscription; the listener lives as long as the source.
    fn on_change(&self, listener: VisibilityListener);
}

static PAGE_HIDDEN: AtomicBool = AtomicBool::new(false);

/// Wires a host visibility source into the process-wide flag.
///
/// Reads the source's current state once and subscribes for updates.
/// Call at startup, before dispatching events.
pub fn install(source: &dyn VisibilitySource) {
    PAGE_HIDDEN.store(source.visibility() == Visibility::Hidden, Ordering::Relaxed);
    source.on_change(Box::new(|state| {
        PAGE_HIDDEN.store(state == Visibility::Hidden, Ordering::Relaxed);
    }));
}

/// Whether the host page is currently hidden.
pub(crate) fn page_hidden() -> bool {
    PAGE_HIDDEN.load(Ordering::Relaxed)
}
