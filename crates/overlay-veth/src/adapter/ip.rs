//! Kernel-backed adapters.
//!
//! Namespace-scoped operations run `ip` under `nsenter --net=<path>`, so
//! each call enters the namespace in a child process and the daemon's own
//! network namespace is never touched.

use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::Path;

use async_trait::async_trait;
use ipnet::IpNet;
use serde::Deserialize;
use tracing::debug;

use super::{NamespaceAdapter, NetlinkAdapter};
use crate::command::{Privilege, exec};
use crate::error::AdapterError;
use crate::types::{Addr, Family, Link, NetNs, Scope};

// ---------------------------------------------------------------------------
// Namespaces
// ---------------------------------------------------------------------------

/// Resolves namespaces by opening their bind-mount (or `/proc`) path.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsNamespaceAdapter;

#[async_trait]
impl NamespaceAdapter for FsNamespaceAdapter {
    async fn get_ns(&self, path: &Path) -> Result<NetNs, AdapterError> {
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                AdapterError::NamespaceNotFound(path.to_path_buf())
            } else {
                AdapterError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        debug!(path = %path.display(), "opened network namespace");
        Ok(NetNs::pinned(path, file.into_std().await))
    }
}

// ---------------------------------------------------------------------------
// `ip` output decoding (pure functions)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IpLink {
    ifindex: u32,
    ifname: String,
    #[serde(default)]
    mtu: u32,
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpAddrLink {
    #[serde(default)]
    addr_info: Vec<IpAddrInfo>,
}

#[derive(Debug, Deserialize)]
struct IpAddrInfo {
    #[serde(default)]
    local: Option<IpAddr>,
    /// Peer address of a point-to-point entry.
    #[serde(default)]
    address: Option<IpAddr>,
    #[serde(default)]
    prefixlen: u8,
    #[serde(default)]
    scope: Option<String>,
}

fn parse_links(output: &str) -> Result<Vec<Link>, AdapterError> {
    if output.is_empty() {
        return Ok(Vec::new());
    }
    let links: Vec<IpLink> = serde_json::from_str(output)?;
    Ok(links
        .into_iter()
        .map(|l| Link {
            index: l.ifindex,
            name: l.ifname,
            mtu: l.mtu,
            hardware_address: l.address,
        })
        .collect())
}

fn host_prefix(ip: IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn ip_net(ip: IpAddr, prefix_len: u8) -> Result<IpNet, AdapterError> {
    IpNet::new(ip, prefix_len).map_err(|e| AdapterError::InvalidAddress {
        addr: format!("{ip}/{prefix_len}"),
        reason: e.to_string(),
    })
}

/// Decode `ip -j addr show` output. With a peer, `prefixlen` belongs to the
/// peer and the local side is a host address.
fn parse_addrs(output: &str, family: Family) -> Result<Vec<Addr>, AdapterError> {
    if output.is_empty() {
        return Ok(Vec::new());
    }
    let links: Vec<IpAddrLink> = serde_json::from_str(output)?;
    let mut addrs = Vec::new();
    for info in links.into_iter().flat_map(|l| l.addr_info) {
        let Some(local) = info.local else {
            continue;
        };
        let scope = info
            .scope
            .as_deref()
            .and_then(Scope::from_name)
            .unwrap_or_default();
        let addr = match info.address {
            Some(peer) if peer != local => Addr {
                local: ip_net(local, host_prefix(local))?,
                peer: Some(ip_net(peer, info.prefixlen)?),
                scope,
            },
            _ => Addr {
                local: ip_net(local, info.prefixlen)?,
                peer: None,
                scope,
            },
        };
        if family.matches(&addr.local) {
            addrs.push(addr);
        }
    }
    Ok(addrs)
}

/// Arguments for `ip addr add|del` of `addr` on `dev`.
fn addr_args(verb: &str, addr: &Addr, dev: &str) -> Vec<String> {
    let mut args = vec!["addr".to_string(), verb.to_string(), addr.local.to_string()];
    if let Some(peer) = &addr.peer {
        args.push("peer".into());
        args.push(peer.to_string());
    }
    if verb == "add" {
        args.push("scope".into());
        args.push(addr.scope.as_str().into());
    }
    args.push("dev".into());
    args.push(dev.into());
    args
}

fn family_flag(family: Family) -> Option<&'static str> {
    match family {
        Family::All => None,
        Family::V4 => Some("-4"),
        Family::V6 => Some("-6"),
    }
}

/// Map `ip`'s "does not exist" failures for a device to [`AdapterError::LinkNotFound`].
fn link_error(err: AdapterError, name: &str) -> AdapterError {
    match err {
        AdapterError::Command(ref c)
            if c.detail.contains("does not exist") || c.detail.contains("Cannot find device") =>
        {
            AdapterError::LinkNotFound(name.to_string())
        }
        AdapterError::Command(ref c) if c.detail.contains("File exists") => {
            AdapterError::LinkExists(name.to_string())
        }
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Links and addresses
// ---------------------------------------------------------------------------

/// Drives the kernel through `nsenter` and `ip`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpCommandAdapter {
    privilege: Privilege,
}

impl IpCommandAdapter {
    pub fn new(privilege: Privilege) -> Self {
        Self { privilege }
    }

    /// Run `ip <args>` inside `ns`, returning stdout.
    async fn ip(&self, ns: &NetNs, args: &[&str]) -> Result<String, AdapterError> {
        let net = format!("--net={}", ns.path().display());
        let mut full = Vec::with_capacity(args.len() + 2);
        full.push(net.as_str());
        full.push("ip");
        full.extend_from_slice(args);
        Ok(exec("nsenter", &full, self.privilege).await?)
    }
}

#[async_trait]
impl NetlinkAdapter for IpCommandAdapter {
    async fn list_links(&self, ns: &NetNs) -> Result<Vec<Link>, AdapterError> {
        let output = self.ip(ns, &["-j", "link", "show"]).await?;
        parse_links(&output)
    }

    async fn link_by_name(&self, ns: &NetNs, name: &str) -> Result<Link, AdapterError> {
        let output = self
            .ip(ns, &["-j", "link", "show", "dev", name])
            .await
            .map_err(|e| link_error(e, name))?;
        parse_links(&output)?
            .into_iter()
            .next()
            .ok_or_else(|| AdapterError::LinkNotFound(name.to_string()))
    }

    async fn add_veth_pair(
        &self,
        ns: &NetNs,
        name: &str,
        peer: &str,
        mtu: u32,
    ) -> Result<(), AdapterError> {
        let mtu = mtu.to_string();
        self.ip(
            ns,
            &[
                "link", "add", name, "mtu", &mtu, "type", "veth", "peer", "name", peer, "mtu",
                &mtu,
            ],
        )
        .await
        .map_err(|e| link_error(e, name))?;
        Ok(())
    }

    async fn set_link_ns(
        &self,
        ns: &NetNs,
        name: &str,
        target: &NetNs,
    ) -> Result<(), AdapterError> {
        let target = target.path().display().to_string();
        self.ip(ns, &["link", "set", "dev", name, "netns", &target])
            .await
            .map_err(|e| link_error(e, name))?;
        Ok(())
    }

    async fn set_link_up(&self, ns: &NetNs, name: &str) -> Result<(), AdapterError> {
        self.ip(ns, &["link", "set", "dev", name, "up"])
            .await
            .map_err(|e| link_error(e, name))?;
        Ok(())
    }

    async fn list_addrs(
        &self,
        ns: &NetNs,
        link: &Link,
        family: Family,
    ) -> Result<Vec<Addr>, AdapterError> {
        let mut args = vec!["-j"];
        args.extend(family_flag(family));
        args.extend(["addr", "show", "dev", link.name.as_str()]);
        let output = self
            .ip(ns, &args)
            .await
            .map_err(|e| link_error(e, &link.name))?;
        parse_addrs(&output, family)
    }

    async fn add_addr(&self, ns: &NetNs, link: &Link, addr: &Addr) -> Result<(), AdapterError> {
        let args = addr_args("add", addr, &link.name);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.ip(ns, &args).await.map_err(|e| match e {
            AdapterError::Command(ref c) if c.detail.contains("File exists") => {
                AdapterError::AddressExists {
                    addr: addr.local.to_string(),
                    link: link.name.clone(),
                }
            }
            other => link_error(other, &link.name),
        })?;
        Ok(())
    }

    async fn del_addr(&self, ns: &NetNs, link: &Link, addr: &Addr) -> Result<(), AdapterError> {
        let args = addr_args("del", addr, &link.name);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.ip(ns, &args).await.map_err(|e| match e {
            AdapterError::Command(ref c) if c.detail.contains("Cannot assign") => {
                AdapterError::AddressNotFound {
                    addr: addr.local.to_string(),
                    link: link.name.clone(),
                }
            }
            other => link_error(other, &link.name),
        })?;
        Ok(())
    }

    async fn del_link(&self, ns: &NetNs, name: &str) -> Result<(), AdapterError> {
        self.ip(ns, &["link", "del", "dev", name])
            .await
            .map_err(|e| link_error(e, name))?;
        Ok(())
    }
}
