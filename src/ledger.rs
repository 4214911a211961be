//! The process-wide annotation ledger.
//!
//! The ledger maps a cause's identity (the address of its shared chain node)
//! to the annotation state of the unwind episode it belongs to. It is what
//! makes repeated annotation attempts at different stack depths collapse to
//! a single effective annotation, and what lets a resolving interceptor
//! reopen annotation for the frames above it.
//!
//! Identities are per-allocation, so two textually identical causes are
//! distinct entries, and episodes on independent threads cannot interfere:
//! an unwind belongs to exactly one thread of control, so all operations on
//! one key happen on one thread. The lock only guards unrelated episodes
//! against each other.
//!
//! Every insertion has a matching removal: entries are removed explicitly
//! when an episode is absorbed or dispatched, and unconditionally when the
//! cause itself is dropped. The drop hook also keeps a recycled allocation
//! address from resurrecting a stale entry.

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;
use spin::RwLock;

/// Annotation state of one cause identity within its unwind episode.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum AnnotationState {
    /// Annotated, and no later interceptor has closed the episode yet.
    /// Further annotation attempts on this identity are suppressed.
    Open,
    /// A resolving interceptor closed the episode for this identity.
    /// Annotation is effective again; duplicate resolves are no-ops.
    Resolved,
}

static LEDGER: RwLock<HashMap<usize, AnnotationState, FxBuildHasher>> =
    RwLock::new(HashMap::with_hasher(FxBuildHasher));

pub(crate) fn state(identity: usize) -> Option<AnnotationState> {
    LEDGER.read().get(&identity).copied()
}

pub(crate) fn open(identity: usize) {
    LEDGER.write().insert(identity, AnnotationState::Open);
}

pub(crate) fn mark_resolved(identity: usize) {
    LEDGER.write().insert(identity, AnnotationState::Resolved);
}

/// Flips an `Open` entry to `Resolved`. Returns whether the entry was open.
pub(crate) fn close(identity: usize) -> bool {
    let mut ledger = LEDGER.write();
    match ledger.get_mut(&identity) {
        Some(state) if *state == AnnotationState::Open => {
            *state = AnnotationState::Resolved;
            true
        }
        _ => false,
    }
}

pub(crate) fn discard(identity: usize) {
    LEDGER.write().remove(&identity);
}

/// The number of live annotation entries in the process-wide ledger.
///
/// Diagnostic surface: after an unwind episode has been absorbed, dispatched,
/// or has escaped to a top-level catch and its payload was dropped, the count
/// returns to whatever it was before the episode started.
#[must_use]
pub fn annotation_count() -> usize {
    LEDGER.read().len()
}
