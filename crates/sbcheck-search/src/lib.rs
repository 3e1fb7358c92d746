//! The matching engine and the batch operations built around it.
//!
//! Everything here is generic over [`CatalogStore`](sbcheck_core::store::CatalogStore)
//! and the collaborator traits in [`sbcheck_core::provider`], so a run can be
//! driven against SQLite and network clients in production, or an in-memory
//! store and fakes in tests.

#![allow(async_fn_in_trait)]

pub mod artifacts;
pub mod config;
pub mod error;
pub mod ingest;
pub mod interp;
pub mod matcher;
pub mod provider;

pub use config::SearchConfig;
pub use error::{Error, Result};
pub use interp::{Interpolator, Track};
pub use matcher::{FovMatcher, SearchSummary, Verdict};
pub use provider::StoredEphemeris;

#[cfg(test)]
mod tests;
