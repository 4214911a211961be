//! Extension methods bridging ordinary `Result`-based code into unwinds.

use std::error::Error;

use crate::cause::Cause;

/// Extension trait starting a known unwind from an `Err`.
///
/// These are the adapters between the ordinary calling convention and this
/// crate's unwind-based propagation: deep call chains raise on failure, and
/// a single [`absorb`](crate::absorb) at the boundary converts the unwind
/// back into a `Result`.
///
/// # Examples
///
/// ```
/// use causeway::prelude::*;
///
/// fn parse_port(input: &str) -> u16 {
///     input
///         .parse()
///         .or_raise_with(|| format!("invalid port {input:?}"))
/// }
///
/// let cause = causeway::absorb(|| parse_port("eleven")).unwrap_err();
/// assert!(cause.to_string().starts_with("invalid port \"eleven\":"));
/// ```
pub trait ResultExt<T> {
    /// Returns the `Ok` value, or unwinds with a known cause wrapping the
    /// error.
    fn or_raise(self) -> T;

    /// Returns the `Ok` value, or unwinds with a known cause rendered as
    /// `"{message}: {err}"`. The message closure is only invoked on the
    /// error path.
    fn or_raise_with(self, message: impl FnOnce() -> String) -> T;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Error + Send + Sync + 'static,
{
    fn or_raise(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => crate::intercept::raise(err),
        }
    }

    fn or_raise_with(self, message: impl FnOnce() -> String) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                let composed = format!("{}: {err}", message());
                std::panic::panic_any(Cause::claim_boxed(composed, Box::new(err)))
            }
        }
    }
}
