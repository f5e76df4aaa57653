//! Kernel primitives used by the [`VethManager`](crate::VethManager).
//!
//! Every [`NetlinkAdapter`] call names the namespace it acts in and runs
//! entirely inside it. Callers never switch their own namespace.

mod ip;
mod memory;

use std::path::Path;

use async_trait::async_trait;

pub use ip::{FsNamespaceAdapter, IpCommandAdapter};
pub use memory::MemoryKernel;

use crate::error::AdapterError;
use crate::types::{Addr, Family, Link, NetNs};

#[async_trait]
pub trait NamespaceAdapter: Send + Sync {
    /// Resolve the namespace bound at `path`.
    async fn get_ns(&self, path: &Path) -> Result<NetNs, AdapterError>;
}

#[async_trait]
pub trait NetlinkAdapter: Send + Sync {
    async fn list_links(&self, ns: &NetNs) -> Result<Vec<Link>, AdapterError>;

    async fn link_by_name(&self, ns: &NetNs, name: &str) -> Result<Link, AdapterError>;

    /// Create a veth pair inside `ns`, both ends with the given MTU.
    async fn add_veth_pair(
        &self,
        ns: &NetNs,
        name: &str,
        peer: &str,
        mtu: u32,
    ) -> Result<(), AdapterError>;

    /// Move link `name` from `ns` into `target`.
    async fn set_link_ns(&self, ns: &NetNs, name: &str, target: &NetNs)
    -> Result<(), AdapterError>;

    async fn set_link_up(&self, ns: &NetNs, name: &str) -> Result<(), AdapterError>;

    async fn list_addrs(
        &self,
        ns: &NetNs,
        link: &Link,
        family: Family,
    ) -> Result<Vec<Addr>, AdapterError>;

    fn parse_addr(&self, addr: &str) -> Result<Addr, AdapterError> {
        Addr::parse(addr)
    }

    async fn add_addr(&self, ns: &NetNs, link: &Link, addr: &Addr) -> Result<(), AdapterError>;

    async fn del_addr(&self, ns: &NetNs, link: &Link, addr: &Addr) -> Result<(), AdapterError>;

    /// Delete link `name` from `ns`. Deleting either end of a veth pair
    /// removes both.
    async fn del_link(&self, ns: &NetNs, name: &str) -> Result<(), AdapterError>;
}
