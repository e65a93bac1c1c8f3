//! Negative-risk arbitrage scanner.
//!
//! Re-exports the modules used by the `negrisk` binary so they can be
//! exercised from tests and embedded elsewhere.

pub mod alerts;
pub mod arb;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod feed;
pub mod store;
