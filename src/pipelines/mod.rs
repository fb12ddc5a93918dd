//! Alignment post-processing pipelines.
//!
//! - `linear`: hits against a linear concatenated reference

pub mod linear;
