//! Event bus provider implementations.
//!
//! This module contains concrete implementations of the `EventBusProvider`
//! trait for different bus backends.

pub mod eventbridge;
pub mod memory;

pub use eventbridge::EventBridgeProvider;
pub use memory::{Delivery, InMemoryProvider, ReplayScript, ReplayStep};
