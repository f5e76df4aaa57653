use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ipnet::IpNet;
use tokio::sync::Mutex;

use super::{NamespaceAdapter, NetlinkAdapter};
use crate::error::AdapterError;
use crate::types::{Addr, Family, Link, NetNs, Scope};

/// In-process model of the kernel's namespace and link tables.
///
/// Implements both adapter traits. Each namespace starts with a loopback
/// link, links gain an IPv6 link-local address when brought up, and
/// deleting either end of a veth pair deletes both.
#[derive(Debug, Default)]
pub struct MemoryKernel {
    state: Mutex<KernelState>,
}

#[derive(Debug, Default)]
struct KernelState {
    namespaces: HashMap<PathBuf, BTreeMap<String, MemoryLink>>,
    last_index: u32,
}

#[derive(Debug, Clone)]
struct MemoryLink {
    index: u32,
    mtu: u32,
    up: bool,
    hardware_address: String,
    /// Namespace path and name of the other end of a veth pair.
    peer: Option<(PathBuf, String)>,
    addrs: Vec<Addr>,
}

impl MemoryLink {
    fn to_link(&self, name: &str) -> Link {
        Link {
            index: self.index,
            name: name.to_string(),
            mtu: self.mtu,
            hardware_address: Some(self.hardware_address.clone()),
        }
    }
}

impl KernelState {
    fn next_link(&mut self, mtu: u32) -> MemoryLink {
        self.last_index += 1;
        let [a, b, c, d] = self.last_index.to_be_bytes();
        MemoryLink {
            index: self.last_index,
            mtu,
            up: false,
            hardware_address: format!("02:00:{a:02x}:{b:02x}:{c:02x}:{d:02x}"),
            peer: None,
            addrs: Vec::new(),
        }
    }

    fn links(&self, ns: &NetNs) -> Result<&BTreeMap<String, MemoryLink>, AdapterError> {
        self.namespaces
            .get(ns.path())
            .ok_or_else(|| AdapterError::NamespaceNotFound(ns.path().to_path_buf()))
    }

    fn links_mut(
        &mut self,
        ns: &NetNs,
    ) -> Result<&mut BTreeMap<String, MemoryLink>, AdapterError> {
        self.namespaces
            .get_mut(ns.path())
            .ok_or_else(|| AdapterError::NamespaceNotFound(ns.path().to_path_buf()))
    }

    fn link(&self, ns: &NetNs, name: &str) -> Result<&MemoryLink, AdapterError> {
        self.links(ns)?
            .get(name)
            .ok_or_else(|| AdapterError::LinkNotFound(name.to_string()))
    }

    fn link_mut(&mut self, ns: &NetNs, name: &str) -> Result<&mut MemoryLink, AdapterError> {
        self.links_mut(ns)?
            .get_mut(name)
            .ok_or_else(|| AdapterError::LinkNotFound(name.to_string()))
    }

    /// Remove a link and, for a veth end, its peer.
    fn remove_link(&mut self, path: &Path, name: &str) -> Option<MemoryLink> {
        let link = self.namespaces.get_mut(path)?.remove(name)?;
        if let Some((peer_path, peer_name)) = &link.peer
            && let Some(links) = self.namespaces.get_mut(peer_path)
        {
            links.remove(peer_name);
        }
        Some(link)
    }
}

impl MemoryKernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a namespace at `path` holding only a loopback link.
    pub async fn add_namespace(&self, path: impl Into<PathBuf>) -> NetNs {
        let path = path.into();
        let mut state = self.state.lock().await;
        let mut lo = state.next_link(65536);
        lo.hardware_address = "00:00:00:00:00:00".into();
        lo.up = true;
        lo.addrs = vec![
            Addr {
                local: IpNet::from(IpAddr::V4(Ipv4Addr::LOCALHOST)),
                peer: None,
                scope: Scope::Host,
            },
            Addr {
                local: IpNet::from(IpAddr::V6(Ipv6Addr::LOCALHOST)),
                peer: None,
                scope: Scope::Host,
            },
        ];
        state
            .namespaces
            .insert(path.clone(), BTreeMap::from([("lo".to_string(), lo)]));
        NetNs::new(path)
    }

    /// Tear a namespace down from outside, taking its links with it and
    /// removing the peers of any veth ends it held.
    pub async fn remove_namespace(&self, path: &Path) {
        let mut state = self.state.lock().await;
        let names: Vec<String> = state
            .namespaces
            .get(path)
            .map(|links| links.keys().cloned().collect())
            .unwrap_or_default();
        for name in names {
            state.remove_link(path, &name);
        }
        state.namespaces.remove(path);
    }

    pub async fn is_up(&self, ns: &NetNs, name: &str) -> Result<bool, AdapterError> {
        let state = self.state.lock().await;
        Ok(state.link(ns, name)?.up)
    }

    /// Name and namespace path of the other end of veth `name`.
    pub async fn peer_of(
        &self,
        ns: &NetNs,
        name: &str,
    ) -> Result<Option<(PathBuf, String)>, AdapterError> {
        let state = self.state.lock().await;
        Ok(state.link(ns, name)?.peer.clone())
    }
}

#[async_trait]
impl NamespaceAdapter for MemoryKernel {
    async fn get_ns(&self, path: &Path) -> Result<NetNs, AdapterError> {
        let state = self.state.lock().await;
        if state.namespaces.contains_key(path) {
            Ok(NetNs::new(path))
        } else {
            Err(AdapterError::NamespaceNotFound(path.to_path_buf()))
        }
    }
}

#[async_trait]
impl NetlinkAdapter for MemoryKernel {
    async fn list_links(&self, ns: &NetNs) -> Result<Vec<Link>, AdapterError> {
        let state = self.state.lock().await;
        let mut links: Vec<Link> = state
            .links(ns)?
            .iter()
            .map(|(name, link)| link.to_link(name))
            .collect();
        links.sort_by_key(|l| l.index);
        Ok(links)
    }

    async fn link_by_name(&self, ns: &NetNs, name: &str) -> Result<Link, AdapterError> {
        let state = self.state.lock().await;
        Ok(state.link(ns, name)?.to_link(name))
    }

    async fn add_veth_pair(
        &self,
        ns: &NetNs,
        name: &str,
        peer: &str,
        mtu: u32,
    ) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        let links = state.links(ns)?;
        for candidate in [name, peer] {
            if links.contains_key(candidate) {
                return Err(AdapterError::LinkExists(candidate.to_string()));
            }
        }
        if name == peer {
            return Err(AdapterError::LinkExists(peer.to_string()));
        }

        let path = ns.path().to_path_buf();
        let mut end = state.next_link(mtu);
        end.peer = Some((path.clone(), peer.to_string()));
        let mut other = state.next_link(mtu);
        other.peer = Some((path, name.to_string()));

        let links = state.links_mut(ns)?;
        links.insert(name.to_string(), end);
        links.insert(peer.to_string(), other);
        Ok(())
    }

    async fn set_link_ns(
        &self,
        ns: &NetNs,
        name: &str,
        target: &NetNs,
    ) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        if state.links(target)?.contains_key(name) {
            return Err(AdapterError::LinkExists(name.to_string()));
        }
        let mut link = state
            .links_mut(ns)?
            .remove(name)
            .ok_or_else(|| AdapterError::LinkNotFound(name.to_string()))?;

        // The kernel downs a link and flushes its addresses on a namespace move.
        link.up = false;
        link.addrs.clear();
        if let Some((peer_path, peer_name)) = &link.peer
            && let Some(peer) = state
                .namespaces
                .get_mut(peer_path)
                .and_then(|links| links.get_mut(peer_name))
        {
            peer.peer = Some((target.path().to_path_buf(), name.to_string()));
        }
        state.links_mut(target)?.insert(name.to_string(), link);
        Ok(())
    }

    async fn set_link_up(&self, ns: &NetNs, name: &str) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        let link = state.link_mut(ns, name)?;
        link.up = true;
        if !link.addrs.iter().any(|a| Family::V6.matches(&a.local)) {
            let suffix = u16::try_from(link.index).unwrap_or(u16::MAX);
            let local = Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, suffix);
            link.addrs.push(Addr {
                local: IpNet::new(IpAddr::V6(local), 64).map_err(|e| {
                    AdapterError::InvalidAddress {
                        addr: local.to_string(),
                        reason: e.to_string(),
                    }
                })?,
                peer: None,
                scope: Scope::Link,
            });
        }
        Ok(())
    }

    async fn list_addrs(
        &self,
        ns: &NetNs,
        link: &Link,
        family: Family,
    ) -> Result<Vec<Addr>, AdapterError> {
        let state = self.state.lock().await;
        let link = state.link(ns, &link.name)?;
        Ok(link
            .addrs
            .iter()
            .filter(|a| family.matches(&a.local))
            .cloned()
            .collect())
    }

    async fn add_addr(&self, ns: &NetNs, link: &Link, addr: &Addr) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        let entry = state.link_mut(ns, &link.name)?;
        if entry.addrs.iter().any(|a| a.local.addr() == addr.local.addr()) {
            return Err(AdapterError::AddressExists {
                addr: addr.local.to_string(),
                link: link.name.clone(),
            });
        }
        entry.addrs.push(addr.clone());
        Ok(())
    }

    async fn del_addr(&self, ns: &NetNs, link: &Link, addr: &Addr) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        let entry = state.link_mut(ns, &link.name)?;
        let before = entry.addrs.len();
        entry.addrs.retain(|a| a.local != addr.local);
        if entry.addrs.len() == before {
            return Err(AdapterError::AddressNotFound {
                addr: addr.local.to_string(),
                link: link.name.clone(),
            });
        }
        Ok(())
    }

    async fn del_link(&self, ns: &NetNs, name: &str) -> Result<(), AdapterError> {
        let mut state = self.state.lock().await;
        state.links(ns)?;
        state
            .remove_link(ns.path(), name)
            .map(|_| ())
            .ok_or_else(|| AdapterError::LinkNotFound(name.to_string()))
    }
}
