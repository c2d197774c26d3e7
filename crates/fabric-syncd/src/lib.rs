//! fabric-syncd - fabric synchronization daemon
//!
//! Reflects SDN networks and baremetal port bindings on the fabric backend:
//! fabric networks and their uplinkset membership, and server profile
//! connections. A periodic pass repairs drift and removes orphans.

pub mod config;
mod driver;
mod file_store;
pub mod mapping;
mod network;
mod port;
pub mod profile;
mod sync;
mod tables;
pub mod validator;

pub use config::Config;
pub use driver::{BindSegment, FabricDriver, PortContext, SegmentBinding};
pub use file_store::FileStore;
pub use mapping::{
    MappingSource, MappingTable, MappingTarget, ResolvedMappings, UplinkTarget, UplinkTopology,
};
pub use network::NetworkReconciler;
pub use port::{PortReconciler, PowerPolicy};
pub use sync::{owner_of, SynchronizationLoop};
pub use tables::*;
