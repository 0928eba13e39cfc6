//! Swap quote routing backend library.

pub mod api;
pub mod market;
pub mod plan;
pub mod quoting;
pub mod types;
