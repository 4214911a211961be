//! Scoped interception of in-flight unwinds.
//!
//! Every operation here runs a closure and inspects any unwind that escapes
//! it, in place of the deferred-interceptor registration the same patterns
//! use in languages with `defer`/`recover`. The policy throughout is the
//! same: unwinds this crate does not own are re-raised with the original
//! payload, identity-equal; only known unwinds are ever transformed or
//! terminated.

use core::any::Any;
use std::{
    error::Error,
    panic::{self, AssertUnwindSafe},
};

use crate::{
    cause::{Cause, payload_is_known},
    ledger::{self, AnnotationState},
};

/// Unwinds with a known cause wrapping `err`.
///
/// This is the error-typed unwind entry point; for formatted messages use
/// [`raise!`](crate::raise!), and for arbitrary payloads [`raise_any`].
///
/// # Examples
///
/// ```
/// use std::io;
///
/// let cause = causeway::absorb(|| -> () {
///     causeway::raise(io::Error::other("disk on fire"))
/// })
/// .unwrap_err();
/// assert_eq!(cause.to_string(), "disk on fire");
/// ```
pub fn raise<E>(err: E) -> !
where
    E: Error + Send + Sync + 'static,
{
    panic::panic_any(Cause::claim(err))
}

/// Unwinds with an arbitrary value, normalized into a known cause.
///
/// The value is rendered the way [`Cause::capture`] renders panic payloads.
pub fn raise_any(value: impl Any + Send) -> ! {
    let payload: Box<dyn Any + Send> = Box::new(value);
    panic::panic_any(Cause::capture(payload).into_known())
}

/// Runs `f`, annotating any unwind that escapes it with `"{message}: {cause}"`.
///
/// Annotation is idempotent per episode: if a nested interceptor already
/// annotated this exact unwind and no interceptor has resolved it since, the
/// unwind is re-raised unchanged and `message` is never built. Otherwise a
/// new known cause is chained onto the previous one and recorded as the
/// episode's open annotation.
///
/// The message closure is only invoked on the unwind path.
///
/// # Examples
///
/// ```
/// let cause = causeway::absorb(|| {
///     causeway::annotate(
///         || "loading configuration".to_owned(),
///         || -> () { causeway::raise!("missing field 'name'") },
///     )
/// })
/// .unwrap_err();
/// assert_eq!(cause.to_string(), "loading configuration: missing field 'name'");
/// ```
pub fn annotate<R>(message: impl FnOnce() -> String, f: impl FnOnce() -> R) -> R {
    annotate_with(|cause| format!("{}: {cause}", message()), f)
}

/// [`annotate`] with full control over where the prior cause appears in the
/// composed message.
///
/// # Examples
///
/// ```
/// let cause = causeway::absorb(|| {
///     causeway::annotate_with(
///         |prior| format!("row 7 ({prior}) skipped"),
///         || -> () { causeway::raise!("bad checksum") },
///     )
/// })
/// .unwrap_err();
/// assert_eq!(cause.to_string(), "row 7 (bad checksum) skipped");
/// ```
pub fn annotate_with<R>(compose: impl FnOnce(&Cause) -> String, f: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            let cause = Cause::capture(payload);
            if ledger::state(cause.identity()) == Some(AnnotationState::Open) {
                panic::resume_unwind(Box::new(cause));
            }
            let message = compose(&cause);
            let annotated = Cause::link(message, cause);
            ledger::open(annotated.identity());
            panic::resume_unwind(Box::new(annotated))
        }
    }
}

/// Runs `f`, closing the current annotation episode of any unwind that
/// escapes it.
///
/// The first resolving interceptor an unwind reaches closes the episode:
/// if the unwind carries an open annotation, it is re-raised unchanged
/// (no additional prefix) and the next [`annotate`] above this frame is
/// effective again. If nothing annotated the unwind yet, `resolve` performs
/// the annotation itself, already closed. Duplicate resolves further up the
/// stack re-raise as-is.
///
/// # Examples
///
/// ```
/// let cause = causeway::absorb(|| {
///     causeway::annotate(
///         || "B".to_owned(),
///         || {
///             causeway::resolve(
///                 || "never used".to_owned(),
///                 || causeway::annotate(|| "A".to_owned(), || -> () { panic!("inner") }),
///             )
///         },
///     )
/// })
/// .unwrap_err();
/// assert_eq!(cause.to_string(), "B: A: inner");
/// ```
pub fn resolve<R>(message: impl FnOnce() -> String, f: impl FnOnce() -> R) -> R {
    resolve_with(|cause| format!("{}: {cause}", message()), f)
}

/// [`resolve`] with full control over where the prior cause appears in the
/// composed message, mirroring [`annotate_with`].
pub fn resolve_with<R>(compose: impl FnOnce(&Cause) -> String, f: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            let cause = Cause::capture(payload);
            match ledger::state(cause.identity()) {
                Some(AnnotationState::Open) => {
                    ledger::close(cause.identity());
                    panic::resume_unwind(Box::new(cause))
                }
                Some(AnnotationState::Resolved) => panic::resume_unwind(Box::new(cause)),
                None => {
                    let message = compose(&cause);
                    let annotated = Cause::link(message, cause);
                    ledger::mark_resolved(annotated.identity());
                    panic::resume_unwind(Box::new(annotated))
                }
            }
        }
    }
}

/// Runs `f`, absorbing a known unwind into an ordinary [`Result`].
///
/// This is the only sanctioned way an unwind terminates without propagating
/// further: the episode's ledger entry is released and the cause is returned
/// as `Err`. Unwinds this crate does not own are re-raised unmodified,
/// identity-equal to the original — this crate never silently swallows a
/// fault it did not originate.
///
/// Nested absorbs compose through `Result`: an inner absorb that already
/// consumed the unwind simply returns `Err`, and the outer one sees a normal
/// return.
///
/// # Examples
///
/// ```
/// let result: Result<u32, causeway::Cause> = causeway::absorb(|| {
///     causeway::raise!("nope");
/// });
/// assert_eq!(result.unwrap_err().to_string(), "nope");
///
/// let result: Result<u32, causeway::Cause> = causeway::absorb(|| 7);
/// assert_eq!(result.unwrap(), 7);
/// ```
pub fn absorb<T>(f: impl FnOnce() -> T) -> Result<T, Cause> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Ok(value),
        Err(payload) => {
            if !payload_is_known(&*payload) {
                panic::resume_unwind(payload);
            }
            let cause = Cause::capture(payload);
            ledger::discard(cause.identity());
            Err(cause)
        }
    }
}

/// [`absorb`] through a caller-supplied error constructor.
///
/// The constructor receives the absorbed cause; keeping it reachable through
/// the new error's [`Error::source`] chain preserves known-ness.
///
/// # Examples
///
/// ```
/// #[derive(Debug)]
/// struct AppError(causeway::Cause);
/// # impl std::fmt::Display for AppError {
/// #     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
/// #         write!(f, "app error: {}", self.0)
/// #     }
/// # }
/// # impl std::error::Error for AppError {
/// #     fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
/// #         Some(&self.0)
/// #     }
/// # }
///
/// let err = causeway::absorb_with(AppError, || -> () { causeway::raise!("oof") }).unwrap_err();
/// assert_eq!(err.to_string(), "app error: oof");
/// assert!(causeway::is_known(&err));
/// ```
pub fn absorb_with<T, E>(wrap: impl FnOnce(Cause) -> E, f: impl FnOnce() -> T) -> Result<T, E> {
    absorb(f).map_err(wrap)
}

/// Runs `f`, handing a known unwind to `handler` and consuming it.
///
/// Returns `Some` with the closure's value on a normal return, `None` when
/// the handler consumed a known unwind. Unknown unwinds re-raise without the
/// handler ever being invoked; this crate does not observe faults it does
/// not own.
///
/// # Examples
///
/// ```
/// let seen = std::cell::Cell::new(false);
/// let outcome = causeway::dispatch(
///     |cause| seen.set(cause.to_string() == "oof"),
///     || -> () { causeway::raise!("oof") },
/// );
/// assert!(outcome.is_none());
/// assert!(seen.get());
/// ```
pub fn dispatch<R>(handler: impl FnOnce(Cause), f: impl FnOnce() -> R) -> Option<R> {
    match absorb(f) {
        Ok(value) => Some(value),
        Err(cause) => {
            handler(cause);
            None
        }
    }
}
