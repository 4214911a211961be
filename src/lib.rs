#![deny(
    missing_docs,
    unsafe_code,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Convert in-flight panics into inspectable cause chains.
//!
//! ## Overview
//!
//! This crate lets a program turn an unexpected unwind into a structured
//! error value, and lets multiple nested layers of a call chain each attach
//! context to that unwind — exactly once each, no matter how many layers
//! try. It also ships a streaming stack-trace sanitizer that strips the
//! panic machinery's own frames from a textual trace before it reaches a
//! human.
//!
//! The core distinction throughout is **known** versus **unknown** unwinds.
//! An unwind is known when its cause chain was produced or touched by this
//! crate's entry points ([`raise!`], [`raise`], [`annotate`],
//! [`ResultExt::or_raise`], ...). Known unwinds may be transformed, absorbed
//! into a `Result`, or handed to a handler. Unknown unwinds — faults this
//! crate did not originate — are always re-raised unchanged: this crate
//! never masks somebody else's panic.
//!
//! ## Quick Example
//!
//! ```
//! use causeway::prelude::*;
//!
//! fn read_record(input: &str) -> u32 {
//!     // Deep in a call chain: raise instead of threading Results through
//!     // every layer.
//!     input.parse().or_raise()
//! }
//!
//! // At the boundary: annotate the episode and absorb it into a Result.
//! let result: Result<u32, Cause> = absorb(|| {
//!     annotate(|| "loading record 7".to_owned(), || read_record("not-a-number"))
//! });
//!
//! let cause = result.unwrap_err();
//! assert!(cause.to_string().starts_with("loading record 7: "));
//! assert!(is_known(&cause));
//! ```
//!
//! ## Annotation is idempotent per episode
//!
//! Interceptors at different stack depths do not need to know about each
//! other. While an unwind episode is open, only the first (innermost)
//! [`annotate`] takes effect; the ones above it re-raise unchanged, so a
//! message is never doubled. A [`resolve`] closes the episode, after which
//! the next annotation layer above it is honored again. The bookkeeping
//! lives in a process-wide ledger keyed by cause identity (see
//! [`annotation_count`]), and entries are always released when an episode is
//! absorbed, dispatched, or its cause is dropped.
//!
//! ## Trace sanitization
//!
//! [`TraceSanitizer`] removes internal frame pairs (the panic machinery, the
//! capture routine, and this crate's own frames) from a textual stack
//! trace. It is a streaming [`std::io::Write`] filter: output is
//! byte-identical whether the trace arrives in a single write or one byte at
//! a time. [`report_trace_to`] and the [`exit_trace_to`] family use it to
//! produce cleaned uncaught-panic reports, the latter terminating the
//! process with [`TRACE_EXIT_STATUS`] afterward.

mod cause;
mod intercept;
mod ledger;
mod macros;
mod result_ext;
mod trace;

pub mod prelude;

pub use crate::{
    cause::{Cause, is_known, payload_is_known},
    intercept::{
        absorb, absorb_with, annotate, annotate_with, dispatch, raise, raise_any, resolve,
        resolve_with,
    },
    ledger::annotation_count,
    result_ext::ResultExt,
    trace::{
        TRACE_EXIT_STATUS, TraceSanitizer, absorb_traced, exit_trace_to, exit_trace_to_stderr,
        exit_trace_with, report_trace_to, report_trace_to_stderr, report_trace_with,
    },
};

#[doc(hidden)]
pub mod __private {
    pub use std::format;

    use crate::cause::Cause;

    pub fn raise_message(message: String) -> ! {
        std::panic::panic_any(Cause::known_from_message(message))
    }
}
