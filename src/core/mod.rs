//! Core library: pure domain types plus the ports-and-adapters
//! components that drive detection, risk, execution, and settlement.

pub mod bus;
pub mod domain;
pub mod exchange;
pub mod execution;
pub mod market_data;
pub mod metrics;
pub mod risk;
pub mod settlement;
pub mod store;
pub mod strategy;

#[cfg(feature = "testkit")]
pub mod testkit;
