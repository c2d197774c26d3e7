//! Test infrastructure for the fabric synchronization engine
//!
//! Provides:
//! - An in-memory fabric backend with call recording
//! - Topology, SDN and server fixtures
//! - Verification helpers for uplink membership and server profiles

mod fake_fabric;
pub mod fixtures;
mod verification;

pub use fake_fabric::{FabricCall, FakeFabric, InjectedFailure};
pub use fixtures::*;
pub use verification::*;
