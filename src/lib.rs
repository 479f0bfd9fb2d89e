//! freight-corridor core
//!
//! Corridor matching, capacity accounting and immutable pricing for a
//! marketplace pairing shipments with carrier trips.

pub mod error;
pub mod geo;
pub mod polyline;
pub mod traits;
pub mod osrm;
pub mod cargo;
pub mod config;
pub mod capacity;
pub mod corridor;
pub mod pricing;
pub mod model;
pub mod store;
pub mod orchestrator;

pub use error::{MarketError, Result};
