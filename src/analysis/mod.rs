//! Analysis of resolved holdings.
//!
//! Presentation-side helpers applied on top of an aggregation run's results.

pub mod grouping;

pub use grouping::*;
