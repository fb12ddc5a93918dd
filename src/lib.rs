pub mod core;
pub mod defaults;
pub mod index;
pub mod pipelines;
