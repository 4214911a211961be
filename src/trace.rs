//! Streaming stack-trace sanitization and the trace-reporting entry points.
//!
//! [`TraceSanitizer`] is a stateful line filter: it removes the frame pairs
//! belonging to the panic machinery, the capture routine, and this crate
//! itself from a textual stack trace, and forwards everything else verbatim.
//! It is written against an arbitrary sequence of partial writes — the
//! output is byte-identical whether the trace arrives in one call or one
//! byte at a time.
//!
//! The reporting entry points recover an unwind, render its cause, and emit
//! a sanitized trace of the recovery site to a caller-supplied sink, in the
//! format the platform's own uncaught-panic report uses.

use std::{
    backtrace::Backtrace,
    io::{self, Write},
    panic::{self, AssertUnwindSafe},
    process,
    sync::OnceLock,
};

use crate::{cause::Cause, intercept::absorb};

/// Exit status used by the [`exit_trace_to`] family after reporting.
pub const TRACE_EXIT_STATUS: i32 = 2;

/// The frame-signature patterns whose frame pairs are removed from traces.
///
/// One pattern per class of internal machinery: the panic entry frames, the
/// stack-capture routine's frames, and this crate's own namespace. Each is
/// matched against a whole frame-signature line of the standard backtrace
/// rendering (`"   N: symbol"`).
fn internal_frame_patterns() -> &'static [regex::bytes::Regex; 3] {
    static PATTERNS: OnceLock<[regex::bytes::Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            regex::bytes::Regex::new(
                r"^[ \t]*[0-9]+:[ \t]+(?:core::panicking::|std::panicking::|rust_begin_unwind)",
            )
            .expect("built-in pattern for panic machinery frames should be valid"),
            regex::bytes::Regex::new(r"^[ \t]*[0-9]+:[ \t]+std::backtrace::")
                .expect("built-in pattern for capture routine frames should be valid"),
            regex::bytes::Regex::new(concat!(
                r"^[ \t]*[0-9]+:[ \t]+<?",
                env!("CARGO_CRATE_NAME"),
                "::"
            ))
            .expect("built-in pattern for this crate's frames should be valid"),
        ]
    })
}

fn is_internal_frame(line: &[u8]) -> bool {
    internal_frame_patterns()
        .iter()
        .any(|pattern| pattern.is_match(line))
}

/// A streaming filter removing internal frame pairs from a stack trace.
///
/// Wrap a sink, write the raw trace through [`io::Write`] in chunks of any
/// size, and the sink receives the trace with every internal
/// frame-signature line deleted together with the location line that
/// follows it. All other lines pass through byte-for-byte, in order.
///
/// A successful write always reports the full chunk as consumed, regardless
/// of how many bytes were forwarded — callers cannot infer drop counts from
/// the return value. A sink failure aborts the call with the sink's error;
/// lines consumed up to that point are not re-processed and the failed line
/// is not retried (at-most-once forwarding, not atomic writes), so a
/// subsequent write continues from where flushing stopped.
///
/// A sanitizer instance belongs to a single reporting call; it is not meant
/// to be shared across threads.
///
/// # Examples
///
/// ```
/// use std::io::Write;
///
/// use causeway::TraceSanitizer;
///
/// let trace = "\
///    0: core::panicking::panic_fmt
///              at core/panicking.rs:72:14
///    1: app::main
///              at src/main.rs:9:5
/// ";
///
/// let mut cleaned = Vec::new();
/// let mut sanitizer = TraceSanitizer::new(&mut cleaned);
/// sanitizer.write_all(trace.as_bytes()).unwrap();
/// drop(sanitizer);
/// assert_eq!(
///     &cleaned[..],
///     b"   1: app::main\n             at src/main.rs:9:5\n" as &[u8],
/// );
/// ```
#[derive(Debug)]
pub struct TraceSanitizer<W> {
    sink: W,
    buffer: Vec<u8>,
    suppress_next_line: bool,
}

impl<W> TraceSanitizer<W> {
    /// A sanitizer forwarding to `sink`.
    #[must_use]
    pub fn new(sink: W) -> Self {
        TraceSanitizer {
            sink,
            buffer: Vec::new(),
            suppress_next_line: false,
        }
    }

    /// Returns the sink. A trailing line that never received its terminator
    /// is dropped.
    pub fn into_inner(self) -> W {
        self.sink
    }
}

impl<W: io::Write> TraceSanitizer<W> {
    fn forward_complete_lines(&mut self) -> io::Result<()> {
        while let Some(end) = self.buffer.iter().position(|&byte| byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            if self.suppress_next_line {
                self.suppress_next_line = false;
                continue;
            }
            if is_internal_frame(&line[..line.len() - 1]) {
                self.suppress_next_line = true;
                continue;
            }
            self.sink.write_all(&line)?;
        }
        Ok(())
    }
}

impl<W: io::Write> io::Write for TraceSanitizer<W> {
    fn write(&mut self, chunk: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(chunk);
        self.forward_complete_lines()?;
        Ok(chunk.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

/// The raw trace of the recovery site, with a guaranteed line terminator at
/// the end so the sanitizer never leaves a trailing line buffered.
fn capture_raw_trace() -> String {
    let mut raw = Backtrace::force_capture().to_string();
    if !raw.ends_with('\n') {
        raw.push('\n');
    }
    raw
}

fn sanitize_to_string(raw: &str) -> String {
    let mut cleaned = Vec::new();
    let mut sanitizer = TraceSanitizer::new(&mut cleaned);
    sanitizer
        .write_all(raw.as_bytes())
        .expect("writing to a Vec<u8> is infallible");
    drop(sanitizer);
    String::from_utf8_lossy(&cleaned).into_owned()
}

fn write_trace_report<W: io::Write>(sink: &mut W, header: &str, cause: &Cause) -> io::Result<()> {
    writeln!(sink, "{header}: {cause}:")?;
    let raw = capture_raw_trace();
    let mut sanitizer = TraceSanitizer::new(&mut *sink);
    sanitizer.write_all(raw.as_bytes())?;
    drop(sanitizer);
    writeln!(sink)
}

/// Runs `f`, reporting any unwind that escapes it to `sink` as
/// `"recovered: {cause}:"` followed by a sanitized trace of the recovery
/// site, and consuming the unwind.
///
/// This is a terminal top-level reporter, the library-side replacement for
/// the platform's uncaught-panic output: unlike the inspecting interceptors
/// it consumes unwinds it does not own too. Returns `Some` with the
/// closure's value on a normal return. Reporting is best-effort; sink
/// failures are swallowed.
pub fn report_trace_to<W: io::Write, R>(mut sink: W, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            let cause = Cause::capture(payload);
            let _ = write_trace_report(&mut sink, "recovered", &cause);
            None
        }
    }
}

/// [`report_trace_to`] writing to standard error.
pub fn report_trace_to_stderr<R>(f: impl FnOnce() -> R) -> Option<R> {
    report_trace_to(io::stderr().lock(), f)
}

/// Runs `f`, handing the formatted report (header, cause, and sanitized
/// trace) of any escaping unwind to `consumer` instead of a byte sink.
pub fn report_trace_with<R>(consumer: impl FnOnce(String), f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            let cause = Cause::capture(payload);
            let trace = sanitize_to_string(&capture_raw_trace());
            consumer(format!("recovered: {cause}:\n{trace}\n"));
            None
        }
    }
}

/// Runs `f`, and if an unwind escapes it, reports `"panic: {cause}:"` with a
/// sanitized trace to `sink` and terminates the process with
/// [`TRACE_EXIT_STATUS`].
pub fn exit_trace_to<W: io::Write, R>(mut sink: W, f: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            let cause = Cause::capture(payload);
            let _ = write_trace_report(&mut sink, "panic", &cause);
            process::exit(TRACE_EXIT_STATUS)
        }
    }
}

/// [`exit_trace_to`] writing to standard error.
pub fn exit_trace_to_stderr<R>(f: impl FnOnce() -> R) -> R {
    exit_trace_to(io::stderr().lock(), f)
}

/// [`exit_trace_to`] handing the formatted report to `consumer` before
/// terminating the process.
pub fn exit_trace_with<R>(consumer: impl FnOnce(String), f: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            let cause = Cause::capture(payload);
            let trace = sanitize_to_string(&capture_raw_trace());
            consumer(format!("panic: {cause}:\n{trace}\n"));
            process::exit(TRACE_EXIT_STATUS)
        }
    }
}

/// [`absorb`](crate::absorb) with the recovery-site trace folded into the
/// absorbed cause's message.
///
/// The returned cause renders as `"recovered: {cause}:"` followed by the
/// sanitized trace, and keeps the absorbed cause as its chain tail. Unknown
/// unwinds re-raise unmodified, as with [`absorb`](crate::absorb).
pub fn absorb_traced<T>(f: impl FnOnce() -> T) -> Result<T, Cause> {
    match absorb(f) {
        Ok(value) => Ok(value),
        Err(cause) => {
            let trace = sanitize_to_string(&capture_raw_trace());
            let message = format!("recovered: {cause}:\n{trace}");
            Err(Cause::link(message, cause))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW_TRACE: &str = "   0: std::backtrace::Backtrace::force_capture
             at /rustc/aaaa/library/std/src/backtrace.rs:331:9
   1: causeway::trace::report_trace_to
             at ./src/trace.rs:118:24
   2: std::panicking::try
             at /rustc/aaaa/library/std/src/panicking.rs:520:19
   3: app::load_config
             at ./src/main.rs:38:5
   4: core::panicking::panic_fmt
             at /rustc/aaaa/library/core/src/panicking.rs:72:14
   5: rust_begin_unwind
             at /rustc/aaaa/library/std/src/panicking.rs:665:5
   6: app::main
             at ./src/main.rs:9:5
";

    const CLEAN_TRACE: &str = "   3: app::load_config
             at ./src/main.rs:38:5
   6: app::main
             at ./src/main.rs:9:5
";

    fn run_sanitizer(trace: &[u8], bytes_per_call: usize) -> Vec<u8> {
        let mut cleaned = Vec::new();
        let mut sanitizer = TraceSanitizer::new(&mut cleaned);
        if bytes_per_call == 0 {
            let written = sanitizer.write(trace).unwrap();
            assert_eq!(written, trace.len());
        } else {
            for chunk in trace.chunks(bytes_per_call) {
                let written = sanitizer.write(chunk).unwrap();
                assert_eq!(written, chunk.len());
            }
        }
        drop(sanitizer);
        cleaned
    }

    #[test]
    fn test_sanitizer_output_is_chunking_invariant() {
        let mut previous: Option<Vec<u8>> = None;
        for bytes_per_call in [0, 1, 2, 3, 4, 5, 6, 7, 60, 61, 62, 63, 120, 121, 122, 123] {
            let cleaned = run_sanitizer(RAW_TRACE.as_bytes(), bytes_per_call);
            assert_eq!(cleaned, CLEAN_TRACE.as_bytes(), "{bytes_per_call} bytes per call");
            if let Some(previous) = &previous {
                assert_eq!(&cleaned, previous, "{bytes_per_call} bytes per call");
            }
            previous = Some(cleaned);
        }
    }

    #[test]
    fn test_sanitizer_removes_frame_pairs() {
        let trace = concat!(
            "before marker line\n",
            "   0: causeway::intercept::absorb\n",
            "             at ./src/intercept.rs:10:5\n",
            "after marker line\n",
        );
        let cleaned = run_sanitizer(trace.as_bytes(), 0);
        assert_eq!(cleaned, b"before marker line\nafter marker line\n");
    }

    #[test]
    fn test_sanitizer_passes_ordinary_lines_verbatim() {
        let trace = b"thread 'main' panicked at src/main.rs:9:5:\nno trace here\n";
        let cleaned = run_sanitizer(trace, 0);
        assert_eq!(cleaned, trace);
    }

    #[test]
    fn test_sanitizer_accepts_empty_writes() {
        let mut sanitizer = TraceSanitizer::new(Vec::new());
        assert_eq!(sanitizer.write(b"").unwrap(), 0);
        assert!(sanitizer.into_inner().is_empty());
    }

    #[test]
    fn test_sanitizer_holds_partial_lines() {
        let mut sanitizer = TraceSanitizer::new(Vec::new());
        sanitizer.write_all(b"abc").unwrap();
        assert!(sanitizer.sink.is_empty());
        sanitizer.write_all(b"def\n").unwrap();
        assert_eq!(sanitizer.sink, b"abcdef\n");
    }

    #[test]
    fn test_sanitizer_drops_unterminated_trailing_line() {
        let mut sanitizer = TraceSanitizer::new(Vec::new());
        sanitizer.write_all(b"kept\ntrailing without newline").unwrap();
        assert_eq!(sanitizer.into_inner(), b"kept\n");
    }

    struct FlakySink {
        written: Vec<u8>,
        failures_left: usize,
    }

    impl io::Write for FlakySink {
        fn write(&mut self, chunk: &[u8]) -> io::Result<usize> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink refused"));
            }
            self.written.extend_from_slice(chunk);
            Ok(chunk.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sanitizer_continues_after_sink_failure() {
        let mut sanitizer = TraceSanitizer::new(FlakySink {
            written: Vec::new(),
            failures_left: 1,
        });
        // The first complete line hits the failing sink and is lost; the
        // second was still buffered and goes out on the next call.
        assert!(sanitizer.write(b"one\ntwo\n").is_err());
        assert_eq!(sanitizer.write(b"three\n").unwrap(), 6);
        assert_eq!(sanitizer.into_inner().written, b"two\nthree\n");
    }

    #[test]
    fn test_report_trace_to_consumes_and_reports() {
        let mut sink = Vec::new();
        let outcome = report_trace_to(&mut sink, || -> () { panic!("oof") });
        assert!(outcome.is_none());
        let report = String::from_utf8_lossy(&sink);
        assert!(report.starts_with("recovered: oof:\n"), "{report}");
        assert!(report.ends_with('\n'));
    }

    #[test]
    fn test_report_trace_to_passes_values_through() {
        let mut sink = Vec::new();
        assert_eq!(report_trace_to(&mut sink, || 7), Some(7));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_report_trace_with_formats_report() {
        let mut seen = None;
        let outcome = report_trace_with(
            |report| seen = Some(report),
            || -> () { crate::intercept::raise_any("oof") },
        );
        assert!(outcome.is_none());
        let report = seen.expect("consumer should have been called");
        assert!(report.starts_with("recovered: oof:\n"), "{report}");
    }

    #[test]
    fn test_exit_trace_to_passes_values_through() {
        let mut sink = Vec::new();
        assert_eq!(exit_trace_to(&mut sink, || 7), 7);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_absorb_traced_folds_trace_into_message() {
        let cause = absorb_traced(|| -> () { crate::raise!("oof") }).unwrap_err();
        assert!(cause.to_string().starts_with("recovered: oof:\n"));
        assert_eq!(cause.chain().last().map(|link| link.to_string()), Some("oof".to_owned()));
    }
}
