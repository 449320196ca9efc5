//! services/api/src/lib.rs
//!
//! The HTTP service around the dream-interpretation core: configuration, the
//! model adapter and the REST surface.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
