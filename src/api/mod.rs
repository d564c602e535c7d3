//! Purpose: Define the stable public Rust API boundary for cardcheck.
//! Exports: The types and operations needed by the CLI and tests.
//! Role: Public, additive-only surface over the core modules.
//! Invariants: This module is the only public path to the checker internals.

pub use crate::core::check::{AcceptancePolicy, FileReport, Spike, check_file, check_reader};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{ACCEPTANCE_FAILED_EXIT_CODE, Error, ErrorKind};
pub use crate::core::row::{ResultRow, RowOutcome, parse_record};
