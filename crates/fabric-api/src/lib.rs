//! Fabric backend access for the synchronization engine.
//!
//! - [`FabricGateway`]: the async contract the reconcilers are written against
//! - [`models`]: serde models of the backend resources they touch
//! - [`RestFabricClient`]: the `reqwest` implementation talking to the
//!   backend's REST API
//! - [`FabricError`]: HTTP status mapping and retry classification

pub mod error;
pub mod gateway;
pub mod models;
pub mod rest;

pub use error::{FabricError, FabricResult};
pub use gateway::{FabricGateway, SharedFabricGateway};
pub use models::{
    Collection, Connection, ConnectionBoot, DeviceSlot, EthernetNetwork, Interconnect,
    NewEthernetNetwork, PhysicalPort, PortMap, ProfileState, ServerHardware, ServerProfile,
    UplinkGroup, UplinkGroupUplinkSet, UplinkSet, VirtualPort,
};
pub use rest::{RestClientOptions, RestFabricClient};
