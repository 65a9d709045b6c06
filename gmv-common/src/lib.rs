//! # GMV Common Library
//!
//! Shared code for the genealogy migration viewer:
//! - Wire models for the remote genealogy API
//! - Filter/search state and its URL query form
//! - Geographic helpers (distance, arcs, coordinate validation)
//! - Event types and SSE streaming
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod filters;
pub mod geo;
pub mod models;
pub mod sse;

pub use error::{Error, Result};
pub use filters::FilterState;
pub use geo::Coordinate;
