//! Common infrastructure for the fabric synchronization engine.
//!
//! This crate provides the pieces shared by the engine and its tests:
//!
//! - [`SyncError`]: engine-level error taxonomy
//! - [`PollPolicy`] / [`poll_until`]: fixed-interval waits on the backend
//! - [`StepReport`] / [`SyncReport`]: outcomes of synchronization passes
//! - [`sdn`]: SDN-plane network and port models
//! - [`StateStore`]: SDN queries and binding persistence, with
//!   [`MemoryStore`] as the in-memory implementation

pub mod error;
pub mod poll;
pub mod sdn;
pub mod store;
pub mod task;

pub use error::{SyncError, SyncResult};
pub use poll::{poll_until, PollPolicy};
pub use sdn::{
    BindingProfile, LocalLinkInformation, LogicalNetwork, NetworkSegment, SdnPort, SwitchInfo,
};
pub use store::{
    BindingOp, MemoryStore, NetworkBinding, StateStore, StoreSnapshot, Transaction,
    UplinksetBinding,
};
pub use task::{StepReport, StepStatus, SyncReport, SyncStep};
