//! # datapad_capture
//!
//! Output capture for the datapad execution engine.
//!
//! After a cell executes, this crate turns the raw evidence of what
//! happened (the namespace before and after, the console text, and any
//! explicit display registrations) into a normalized, labeled set of
//! artifacts:
//!
//! 1. **Explicit** registrations are collected first, in registration order
//! 2. **Implicit** capture diffs the namespace through one change detector
//!    per artifact kind; open figures are closed the moment they are
//!    captured so a later sweep cannot re-capture them
//! 3. **Console** fallback parses structured text out of console output when
//!    neither of the above applies, preserving original whitespace
//!
//! An artifact registered explicitly is never also produced implicitly.

pub mod capture;
pub mod change;
pub mod console;

pub use capture::{capture, CaptureOutcome};
pub use change::{ChangeDetector, FigureChangeDetector, TableChangeDetector};
pub use console::parse_console_table;
