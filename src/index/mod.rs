//! Read-only reference index shared by every worker.

pub mod reference;
