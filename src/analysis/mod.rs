//! Analysis modules.
//!
//! Pure aggregation routines and the filter engine that feeds them.

pub mod aggregator;
pub mod filter;

pub use aggregator::*;
pub use filter::{FilterChange, FilterError, FilterState};
