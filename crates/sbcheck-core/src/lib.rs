//! Core types and trait definitions for the sbcheck small-body field checker.
//!
//! This crate is deliberately free of database and network dependencies.
//! The store backend, the search engine and the CLI all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod designation;
pub mod detection;
pub mod ephemeris;
pub mod error;
pub mod exposure;
pub mod geometry;
pub mod provider;
pub mod store;
pub mod time;
pub mod wcs;

pub use error::{Error, Result};
