//! # clinic-sync
//!
//! Connection lifecycle for the clinic local-first store.
//!
//! - [`machine`]: the bounded reconnection policy as a pure transition function
//! - [`ConnectionManager`]: tokio actor driving the policy against a [`SyncConnector`]
//! - [`ReplicaConnector`]: libSQL embedded replica implementation of the connector
//! - [`NetworkSignal`]: host-fed online/offline flag
//! - [`StatusSurface`] / [`SyncIndicator`]: read-only projection for presentation code

pub mod connector;
pub mod error;
pub mod machine;
pub mod manager;
pub mod network;
pub mod replica;
pub mod session;
pub mod surface;

pub use connector::SyncConnector;
pub use error::SyncError;
pub use machine::{ConnectionState, ManualRetry, RetryPolicy, RetrySession};
pub use manager::{ConnectionManager, ManagerSnapshot};
pub use network::NetworkSignal;
pub use replica::ReplicaConnector;
pub use session::SessionSource;
pub use surface::{StatusSurface, SyncIndicator};
