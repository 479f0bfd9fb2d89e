//! Test fixtures for freight-corridor.
//!
//! Provides realistic test data including:
//! - Real São Paulo state locations along the Bandeirantes corridor
//! - Builders for trip and shipment requests

pub mod sao_paulo_locations;

pub use sao_paulo_locations::*;
