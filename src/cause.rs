//! The normalized error-chain node that an unwind payload is converted into.
//!
//! A [`Cause`] wraps the value a panic was raised with. Causes form a
//! singly-linked, acyclic chain: every annotation layer produces a new link
//! whose tail is the previous cause, and the chain is immutable once built.
//! The chain is exposed through [`std::error::Error::source`], so it
//! interoperates with every error-walking utility in the ecosystem.

use core::{any::Any, fmt};
use std::error::Error;

use triomphe::Arc;

use crate::ledger;

/// Rendering used for panic payloads whose type this crate cannot inspect.
///
/// Rust panic payloads are `dyn Any`, so there is no universal textual form.
/// The common payloads (`&str`, `String`, boxed errors and [`Cause`] itself)
/// are rendered exactly; everything else falls back to this notice.
pub(crate) const OPAQUE_PAYLOAD: &str = "opaque panic payload";

/// The tail of a cause chain link.
#[derive(Debug)]
enum Tail {
    /// This link is the end of the chain.
    None,
    /// A link produced by this crate wrapping an earlier cause.
    Chained(Cause),
    /// A foreign error claimed as the root of the chain.
    Root(Box<dyn Error + Send + Sync>),
}

#[derive(Debug)]
struct CauseInner {
    message: String,
    tail: Tail,
    /// The known marker: set on links produced or claimed through this
    /// crate's entry points, never on plain captures.
    known: bool,
}

impl Drop for CauseInner {
    fn drop(&mut self) {
        // The allocation address doubles as the cause's ledger identity, so
        // the entry must not outlive the allocation.
        ledger::discard(self as *const CauseInner as usize);
    }
}

/// A normalized error-chain node wrapping an unwind payload.
///
/// `Cause` is a cheap-to-clone shared handle. Cloning never copies the chain
/// and never changes its identity: annotation deduplication and the known
/// marker both key off the shared allocation, not off textual equality.
///
/// # Examples
///
/// ```
/// let cause = causeway::absorb(|| -> () { causeway::raise!("disk on fire") }).unwrap_err();
/// assert_eq!(cause.to_string(), "disk on fire");
/// assert!(causeway::is_known(&cause));
/// ```
#[derive(Clone, Debug)]
pub struct Cause {
    inner: Arc<CauseInner>,
}

impl Cause {
    fn from_parts(message: String, tail: Tail, known: bool) -> Cause {
        Cause {
            inner: Arc::new(CauseInner {
                message,
                tail,
                known,
            }),
        }
    }

    /// Normalizes a panic payload into a `Cause`.
    ///
    /// A payload that already is a `Cause` is returned unchanged, identity
    /// included — this is what keeps repeated interception of one in-flight
    /// unwind from re-wrapping it. `String`, `&'static str` and
    /// `Box<dyn Error + Send + Sync>` payloads become a minimal cause whose
    /// rendering is their own textual form. Anything else renders as an
    /// opaque-payload notice.
    ///
    /// Captured causes are *not* marked known; only this crate's raising and
    /// annotating entry points embed the marker.
    ///
    /// # Examples
    ///
    /// ```
    /// use causeway::Cause;
    ///
    /// let cause = Cause::capture(Box::new("out of cheese".to_owned()));
    /// assert_eq!(cause.to_string(), "out of cheese");
    /// assert!(!causeway::is_known(&cause));
    /// ```
    #[must_use]
    pub fn capture(payload: Box<dyn Any + Send>) -> Cause {
        let payload = match payload.downcast::<Cause>() {
            Ok(cause) => return *cause,
            Err(payload) => payload,
        };
        let payload = match payload.downcast::<String>() {
            Ok(message) => return Cause::from_parts(*message, Tail::None, false),
            Err(payload) => payload,
        };
        let payload = match payload.downcast::<&'static str>() {
            Ok(message) => return Cause::from_parts((*message).to_owned(), Tail::None, false),
            Err(payload) => payload,
        };
        match payload.downcast::<Box<dyn Error + Send + Sync>>() {
            Ok(err) => {
                let err = *err;
                Cause::from_parts(err.to_string(), Tail::Root(err), false)
            }
            Err(_) => Cause::from_parts(OPAQUE_PAYLOAD.to_owned(), Tail::None, false),
        }
    }

    /// Wraps an arbitrary error and embeds the known marker.
    ///
    /// Use this to explicitly claim an error chain for this crate, making
    /// [`is_known`] report `true` for it and for anything that later wraps
    /// it.
    #[must_use]
    pub fn claim<E>(err: E) -> Cause
    where
        E: Error + Send + Sync + 'static,
    {
        Cause::claim_boxed(err.to_string(), Box::new(err))
    }

    pub(crate) fn claim_boxed(message: String, root: Box<dyn Error + Send + Sync>) -> Cause {
        Cause::from_parts(message, Tail::Root(root), true)
    }

    pub(crate) fn known_from_message(message: String) -> Cause {
        Cause::from_parts(message, Tail::None, true)
    }

    /// A new known link with `prior` as its tail.
    pub(crate) fn link(message: String, prior: Cause) -> Cause {
        Cause::from_parts(message, Tail::Chained(prior), true)
    }

    /// Marks this chain known, wrapping it in one extra link if necessary.
    pub(crate) fn into_known(self) -> Cause {
        if is_known(&self) {
            self
        } else {
            Cause::link(self.inner.message.clone(), self)
        }
    }

    /// The message of this link, which embeds the rendering of the entire
    /// chain below it.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.inner.message
    }

    /// Whether two handles refer to the same chain node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Cause) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Iterates over this link and every link below it in the chain,
    /// including foreign errors interleaved through [`Error::source`].
    pub fn chain(&self) -> impl Iterator<Item = &(dyn Error + 'static)> {
        core::iter::successors(Some(self as &(dyn Error + 'static)), |link| (*link).source())
    }

    /// The ledger identity of this cause. Stable across clones and re-raises
    /// for as long as any handle to the chain node is alive.
    pub(crate) fn identity(&self) -> usize {
        &*self.inner as *const CauseInner as usize
    }

    fn carries_marker(&self) -> bool {
        self.inner.known
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.message)
    }
}

impl Error for Cause {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.inner.tail {
            Tail::None => None,
            Tail::Chained(cause) => Some(cause),
            Tail::Root(err) => Some(&**err),
        }
    }
}

/// Returns `true` when the error, or any link reachable through its
/// [`Error::source`] chain, carries this crate's known marker.
///
/// Wrapping a known chain in additional foreign error layers does not strip
/// known-ness; the walk is unbounded and terminates because chains are
/// acyclic by construction.
///
/// # Examples
///
/// ```
/// use std::fmt;
///
/// #[derive(Debug)]
/// struct Wrapper(causeway::Cause);
///
/// impl fmt::Display for Wrapper {
///     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
///         write!(f, "wrapped: {}", self.0)
///     }
/// }
///
/// impl std::error::Error for Wrapper {
///     fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
///         Some(&self.0)
///     }
/// }
///
/// let cause = causeway::absorb(|| -> () { causeway::raise!("oof") }).unwrap_err();
/// assert!(causeway::is_known(&Wrapper(cause)));
/// ```
#[must_use]
pub fn is_known(err: &(dyn Error + 'static)) -> bool {
    let mut link: Option<&(dyn Error + 'static)> = Some(err);
    while let Some(current) = link {
        if let Some(cause) = current.downcast_ref::<Cause>()
            && cause.carries_marker()
        {
            return true;
        }
        link = current.source();
    }
    false
}

/// [`is_known`] for a still-in-flight panic payload.
///
/// Borrows the payload instead of consuming it, so that payloads this crate
/// does not own can be re-raised identity-equal to the original.
#[must_use]
pub fn payload_is_known(payload: &(dyn Any + Send)) -> bool {
    if let Some(cause) = payload.downcast_ref::<Cause>() {
        return is_known(cause);
    }
    if let Some(err) = payload.downcast_ref::<Box<dyn Error + Send + Sync>>() {
        return is_known(&**err);
    }
    false
}
