//! Veth pair provisioning for overlay containers.
//!
//! [`VethManager`] wires a container network namespace to the host with a
//! veth pair and point-to-point `/32` addressing:
//!
//! ```text
//!   host namespace                     container namespace
//! ┌──────────────────────────┐       ┌──────────────────────────┐
//! │ vethXXXXXXXX             │       │ eth0                     │
//! │ 169.254.0.1/32           │◄─────►│ 10.255.4.5/32            │
//! │ peer 10.255.4.5/32       │       │ peer 169.254.0.1/32      │
//! └──────────────────────────┘       └──────────────────────────┘
//! ```
//!
//! Kernel access goes through the [`NamespaceAdapter`] and
//! [`NetlinkAdapter`] traits. [`FsNamespaceAdapter`] and
//! [`IpCommandAdapter`] drive the real kernel; [`MemoryKernel`] models it
//! in-process.

mod adapter;
mod command;
mod error;
mod manager;
mod types;

pub use adapter::{
    FsNamespaceAdapter, IpCommandAdapter, MemoryKernel, NamespaceAdapter, NetlinkAdapter,
};
pub use command::{CommandError, Privilege};
pub use error::{AdapterError, Side, VethError};
pub use manager::{HOST_POINT_TO_POINT_ADDR, VethManager, VethManagerConfig};
pub use types::{Addr, Family, Link, NetNs, Scope, VethEnd, VethPair};
