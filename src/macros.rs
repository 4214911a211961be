/// Unwind with a formatted known cause.
///
/// Interprets its arguments like [`format!`] and unwinds with a
/// [`Cause`](crate::Cause) carrying the known marker, so the unwind can be
/// annotated, absorbed, or dispatched by the interceptors above it.
///
/// # Examples
///
/// ```
/// fn checked_div(a: u32, b: u32) -> u32 {
///     if b == 0 {
///         causeway::raise!("cannot divide {a} by zero");
///     }
///     a / b
/// }
///
/// assert_eq!(causeway::absorb(|| checked_div(10, 2)).unwrap(), 5);
/// let cause = causeway::absorb(|| checked_div(10, 0)).unwrap_err();
/// assert_eq!(cause.to_string(), "cannot divide 10 by zero");
/// ```
#[macro_export]
macro_rules! raise {
    ($($arg:tt)*) => {
        $crate::__private::raise_message($crate::__private::format!($($arg)*))
    };
}
