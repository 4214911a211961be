//! Commonly used items for convenient importing.
//!
//! The prelude re-exports the interception entry points, the [`Cause`] type,
//! and the [`ResultExt`] bridge, so a single use statement covers the usual
//! surface.
//!
//! # Usage
//!
//! ```rust
//! use causeway::prelude::*;
//!
//! fn read_port(input: &str) -> u16 {
//!     input.parse().or_raise_with(|| format!("invalid port {input:?}"))
//! }
//!
//! let port = absorb(|| read_port("8080")).unwrap();
//! assert_eq!(port, 8080);
//!
//! let cause = absorb(|| read_port("eleven")).unwrap_err();
//! assert!(is_known(&cause));
//! ```

pub use crate::{
    Cause, TraceSanitizer, absorb, absorb_traced, absorb_with, annotate, annotate_with, dispatch,
    is_known, raise, raise_any, resolve, resolve_with, result_ext::ResultExt,
};
