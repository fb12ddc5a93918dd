//! Core reusable components.
//!
//! Everything here is agnostic to how candidate hits are found: hit and
//! operation types, the alignment engine contract, the scratch arena,
//! sequence input and SAM output.

pub mod alignment;
pub mod io;
pub mod utils;
