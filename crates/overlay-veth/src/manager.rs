use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::adapter::{NamespaceAdapter, NetlinkAdapter};
use crate::error::{Side, VethError};
use crate::types::{Addr, Family, Link, NetNs, Scope, VethEnd, VethPair};

/// Host end of every point-to-point link.
pub const HOST_POINT_TO_POINT_ADDR: Ipv4Addr = Ipv4Addr::new(169, 254, 0, 1);

const HOST_NAME_PREFIX: &str = "veth";
const HOST_NAME_ATTEMPTS: u32 = 16;
/// Longest interface name the kernel accepts (`IFNAMSIZ - 1`).
const MAX_LINK_NAME_LEN: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VethManagerConfig {
    pub host_ns_path: PathBuf,
    pub container_ns_path: PathBuf,
}

type HostNameSource = Box<dyn Fn() -> String + Send + Sync>;

/// Wires one container namespace to the host namespace.
///
/// [`init`](Self::init) resolves both namespaces once; afterwards any
/// number of pairs can be created and destroyed between them. Calls that
/// touch the same namespaces must be serialized by the caller.
pub struct VethManager {
    config: VethManagerConfig,
    namespaces: Arc<dyn NamespaceAdapter>,
    netlink: Arc<dyn NetlinkAdapter>,
    host_names: HostNameSource,
    host_ns: Option<NetNs>,
    container_ns: Option<NetNs>,
}

/// `veth` followed by 8 random lowercase hex characters.
fn random_host_name() -> String {
    let bits = (Uuid::new_v4().as_u128() >> 96) as u32;
    format!("{HOST_NAME_PREFIX}{bits:08x}")
}

fn validate_link_name(name: &str) -> Result<(), VethError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_LINK_NAME_LEN
        && name != "."
        && name != ".."
        && !name.chars().any(|c| c == '/' || c == ':' || c.is_whitespace());
    if valid {
        Ok(())
    } else {
        Err(VethError::InvalidName(name.to_string()))
    }
}

impl VethManager {
    pub fn new(
        config: VethManagerConfig,
        namespaces: Arc<dyn NamespaceAdapter>,
        netlink: Arc<dyn NetlinkAdapter>,
    ) -> Self {
        Self {
            config,
            namespaces,
            netlink,
            host_names: Box::new(random_host_name),
            host_ns: None,
            container_ns: None,
        }
    }

    pub fn host_ns(&self) -> Option<&NetNs> {
        self.host_ns.as_ref()
    }

    pub fn container_ns(&self) -> Option<&NetNs> {
        self.container_ns.as_ref()
    }

    /// Resolve the host and container namespaces from their configured paths.
    pub async fn init(&mut self) -> Result<(), VethError> {
        let host = self
            .namespaces
            .get_ns(&self.config.host_ns_path)
            .await
            .map_err(|source| VethError::Namespace {
                side: Side::Host,
                source,
            })?;
        let container = self
            .namespaces
            .get_ns(&self.config.container_ns_path)
            .await
            .map_err(|source| VethError::Namespace {
                side: Side::Container,
                source,
            })?;

        debug!(
            host = %host.path().display(),
            container = %container.path().display(),
            "resolved namespaces"
        );
        self.host_ns = Some(host);
        self.container_ns = Some(container);
        Ok(())
    }

    fn resolved(&self) -> Result<(&NetNs, &NetNs), VethError> {
        match (&self.host_ns, &self.container_ns) {
            (Some(host), Some(container)) => Ok((host, container)),
            _ => Err(VethError::NotInitialized),
        }
    }

    async fn list_links(&self, side: Side, ns: &NetNs) -> Result<Vec<Link>, VethError> {
        self.netlink
            .list_links(ns)
            .await
            .map_err(|source| VethError::ListLinks { side, source })
    }

    /// Create a veth pair with `container_name` in the container namespace
    /// and a generated `veth…` name in the host namespace, both up.
    pub async fn create_pair(&self, container_name: &str, mtu: u32) -> Result<VethPair, VethError> {
        let (host_ns, container_ns) = self.resolved()?;
        validate_link_name(container_name)?;

        let container_links = self.list_links(Side::Container, container_ns).await?;
        if container_links.iter().any(|l| l.name == container_name) {
            return Err(VethError::AlreadyExists(container_name.to_string()));
        }
        let host_links = self.list_links(Side::Host, host_ns).await?;

        let taken = |name: &str| {
            name == container_name
                || host_links.iter().any(|l| l.name == name)
                || container_links.iter().any(|l| l.name == name)
        };
        let host_name = (0..HOST_NAME_ATTEMPTS)
            .map(|_| (self.host_names)())
            .find(|name| !taken(name))
            .ok_or(VethError::HostNameExhausted(HOST_NAME_ATTEMPTS))?;

        self.netlink
            .add_veth_pair(container_ns, container_name, &host_name, mtu)
            .await
            .map_err(|source| VethError::CreatePair {
                name: container_name.to_string(),
                peer: host_name.clone(),
                source,
            })?;
        self.netlink
            .set_link_ns(container_ns, &host_name, host_ns)
            .await
            .map_err(|source| VethError::MoveLink {
                name: host_name.clone(),
                source,
            })?;

        let host = self.bring_up(Side::Host, host_ns, &host_name).await?;
        let container = self
            .bring_up(Side::Container, container_ns, container_name)
            .await?;

        info!(
            host = %host.link.name,
            container = %container.link.name,
            mtu,
            "created veth pair"
        );
        Ok(VethPair { host, container })
    }

    /// Set the link up and re-read it, since the kernel owns its final
    /// attributes.
    async fn bring_up(&self, side: Side, ns: &NetNs, name: &str) -> Result<VethEnd, VethError> {
        self.netlink
            .set_link_up(ns, name)
            .await
            .map_err(|source| VethError::LinkUp {
                side,
                name: name.to_string(),
                source,
            })?;
        let link = self.find_link(side, ns, name).await?;
        Ok(VethEnd {
            link,
            namespace: ns.clone(),
        })
    }

    async fn find_link(&self, side: Side, ns: &NetNs, name: &str) -> Result<Link, VethError> {
        self.netlink
            .link_by_name(ns, name)
            .await
            .map_err(|source| VethError::FindLink {
                side,
                name: name.to_string(),
                source,
            })
    }

    fn parse_addr(&self, side: Side, addr: &str) -> Result<Addr, VethError> {
        self.netlink
            .parse_addr(addr)
            .map_err(|source| VethError::ParseAddress {
                side,
                addr: addr.to_string(),
                source,
            })
    }

    /// Point-to-point addressing: the host end gets
    /// `169.254.0.1/32 peer <container_ip>/32` and the container end the
    /// mirror image, both at link scope.
    ///
    /// Both addresses are parsed before either is applied. A failure on the
    /// container side leaves the host address in place.
    pub async fn assign_ip(&self, pair: &VethPair, container_ip: Ipv4Addr) -> Result<(), VethError> {
        self.resolved()?;

        let host_str = format!("{HOST_POINT_TO_POINT_ADDR}/32");
        let container_str = format!("{container_ip}/32");
        let host_local = self.parse_addr(Side::Host, &host_str)?.local;
        let container_local = self.parse_addr(Side::Container, &container_str)?.local;

        let host_addr = Addr {
            local: host_local,
            peer: Some(container_local),
            scope: Scope::Link,
        };
        let container_addr = Addr {
            local: container_local,
            peer: Some(host_local),
            scope: Scope::Link,
        };

        self.add_addr(Side::Host, &pair.host, &host_str, &host_addr)
            .await?;
        self.add_addr(Side::Container, &pair.container, &container_str, &container_addr)
            .await?;

        info!(
            host = %pair.host.link.name,
            container = %pair.container.link.name,
            %container_ip,
            "assigned point-to-point addresses"
        );
        Ok(())
    }

    async fn add_addr(
        &self,
        side: Side,
        end: &VethEnd,
        display: &str,
        addr: &Addr,
    ) -> Result<(), VethError> {
        let link = self.find_link(side, &end.namespace, &end.link.name).await?;
        self.netlink
            .add_addr(&end.namespace, &link, addr)
            .await
            .map_err(|source| VethError::AddAddress {
                side,
                addr: display.to_string(),
                source,
            })
    }

    /// Remove every IPv6 address from both ends. A no-op when none are
    /// present.
    pub async fn disable_ipv6(&self, pair: &VethPair) -> Result<(), VethError> {
        self.resolved()?;
        for (side, end) in [(Side::Host, &pair.host), (Side::Container, &pair.container)] {
            let link = self.find_link(side, &end.namespace, &end.link.name).await?;
            let addrs = self
                .netlink
                .list_addrs(&end.namespace, &link, Family::V6)
                .await
                .map_err(|source| VethError::ListAddresses {
                    side,
                    name: link.name.clone(),
                    source,
                })?;
            for addr in &addrs {
                self.netlink
                    .del_addr(&end.namespace, &link, addr)
                    .await
                    .map_err(|source| VethError::RemoveAddress {
                        side,
                        addr: addr.local.to_string(),
                        source,
                    })?;
            }
            debug!(%side, link = %link.name, removed = addrs.len(), "disabled ipv6");
        }
        Ok(())
    }

    /// Delete link `name` from whichever namespace holds it, container
    /// namespace first. The peer end goes with it.
    pub async fn destroy(&self, name: &str) -> Result<(), VethError> {
        let (host_ns, container_ns) = self.resolved()?;
        for (side, ns) in [(Side::Container, container_ns), (Side::Host, host_ns)] {
            match self.netlink.del_link(ns, name).await {
                Ok(()) => {
                    info!(%side, link = name, "destroyed veth pair");
                    return Ok(());
                }
                Err(e) if e.is_not_found() => {
                    debug!(%side, link = name, "link not in namespace");
                }
                Err(source) => {
                    return Err(VethError::DeleteLink {
                        name: name.to_string(),
                        source,
                    });
                }
            }
        }
        Err(VethError::LinkNotFound(name.to_string()))
    }
}

impl std::fmt::Debug for VethManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VethManager")
            .field("config", &self.config)
            .field("host_ns", &self.host_ns)
            .field("container_ns", &self.container_ns)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use super::*;
    use crate::adapter::MemoryKernel;
    use crate::error::AdapterError;

    const HOST: &str = "/run/netns/host";
    const CONTAINER: &str = "/run/netns/container";

    fn config() -> VethManagerConfig {
        VethManagerConfig {
            host_ns_path: PathBuf::from(HOST),
            container_ns_path: PathBuf::from(CONTAINER),
        }
    }

    async fn kernel() -> Arc<MemoryKernel> {
        let kernel = Arc::new(MemoryKernel::new());
        kernel.add_namespace(HOST).await;
        kernel.add_namespace(CONTAINER).await;
        kernel
    }

    async fn initialized(netlink: Arc<dyn NetlinkAdapter>, kernel: Arc<MemoryKernel>) -> VethManager {
        let mut manager = VethManager::new(config(), kernel, netlink);
        manager.init().await.unwrap();
        manager
    }

    async fn setup() -> (Arc<MemoryKernel>, VethManager) {
        let kernel = kernel().await;
        let manager = initialized(kernel.clone(), kernel.clone()).await;
        (kernel, manager)
    }

    fn scripted_names(names: &[&str]) -> HostNameSource {
        let names: VecDeque<String> = names.iter().map(|s| s.to_string()).collect();
        let names = StdMutex::new(names);
        Box::new(move || {
            names
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "vethffffffff".into())
        })
    }

    async fn addrs(kernel: &MemoryKernel, end: &VethEnd, family: Family) -> Vec<Addr> {
        kernel
            .list_addrs(&end.namespace, &end.link, family)
            .await
            .unwrap()
    }

    // -- fakes --------------------------------------------------------------

    struct FailingNamespaces {
        fail: &'static str,
    }

    #[async_trait]
    impl NamespaceAdapter for FailingNamespaces {
        async fn get_ns(&self, path: &Path) -> Result<NetNs, AdapterError> {
            if path == Path::new(self.fail) {
                Err(AdapterError::NamespaceNotFound(path.to_path_buf()))
            } else {
                Ok(NetNs::new(path))
            }
        }
    }

    #[derive(Default)]
    struct Faults {
        parse: Option<&'static str>,
        link_by_name: bool,
        add_addr_on: Option<String>,
    }

    /// Delegates to a [`MemoryKernel`], failing the configured calls.
    struct FaultyNetlink {
        kernel: Arc<MemoryKernel>,
        faults: Faults,
    }

    fn kiwi() -> AdapterError {
        AdapterError::InvalidAddress {
            addr: "kiwi".into(),
            reason: "kiwi".into(),
        }
    }

    #[async_trait]
    impl NetlinkAdapter for FaultyNetlink {
        async fn list_links(&self, ns: &NetNs) -> Result<Vec<Link>, AdapterError> {
            self.kernel.list_links(ns).await
        }

        async fn link_by_name(&self, ns: &NetNs, name: &str) -> Result<Link, AdapterError> {
            if self.faults.link_by_name {
                return Err(kiwi());
            }
            self.kernel.link_by_name(ns, name).await
        }

        async fn add_veth_pair(
            &self,
            ns: &NetNs,
            name: &str,
            peer: &str,
            mtu: u32,
        ) -> Result<(), AdapterError> {
            self.kernel.add_veth_pair(ns, name, peer, mtu).await
        }

        async fn set_link_ns(
            &self,
            ns: &NetNs,
            name: &str,
            target: &NetNs,
        ) -> Result<(), AdapterError> {
            self.kernel.set_link_ns(ns, name, target).await
        }

        async fn set_link_up(&self, ns: &NetNs, name: &str) -> Result<(), AdapterError> {
            self.kernel.set_link_up(ns, name).await
        }

        async fn list_addrs(
            &self,
            ns: &NetNs,
            link: &Link,
            family: Family,
        ) -> Result<Vec<Addr>, AdapterError> {
            self.kernel.list_addrs(ns, link, family).await
        }

        fn parse_addr(&self, addr: &str) -> Result<Addr, AdapterError> {
            if self.faults.parse == Some(addr) {
                return Err(kiwi());
            }
            Addr::parse(addr)
        }

        async fn add_addr(&self, ns: &NetNs, link: &Link, addr: &Addr) -> Result<(), AdapterError> {
            if self.faults.add_addr_on.as_deref() == Some(link.name.as_str()) {
                return Err(kiwi());
            }
            self.kernel.add_addr(ns, link, addr).await
        }

        async fn del_addr(&self, ns: &NetNs, link: &Link, addr: &Addr) -> Result<(), AdapterError> {
            self.kernel.del_addr(ns, link, addr).await
        }

        async fn del_link(&self, ns: &NetNs, name: &str) -> Result<(), AdapterError> {
            self.kernel.del_link(ns, name).await
        }
    }

    async fn faulty(kernel: &Arc<MemoryKernel>, faults: Faults) -> VethManager {
        let netlink = Arc::new(FaultyNetlink {
            kernel: kernel.clone(),
            faults,
        });
        initialized(netlink, kernel.clone()).await
    }

    // -- init ---------------------------------------------------------------

    #[tokio::test]
    async fn init_resolves_both_namespaces() {
        let (_, manager) = setup().await;
        assert_eq!(manager.host_ns().unwrap().path(), Path::new(HOST));
        assert_eq!(manager.container_ns().unwrap().path(), Path::new(CONTAINER));
    }

    #[tokio::test]
    async fn init_names_host_side_on_failure() {
        let kernel = kernel().await;
        let mut manager = VethManager::new(
            config(),
            Arc::new(FailingNamespaces { fail: HOST }),
            kernel,
        );
        let err = manager.init().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "getting host namespace: network namespace not found: /run/netns/host"
        );
        assert!(manager.host_ns().is_none());
    }

    #[tokio::test]
    async fn init_names_container_side_on_failure() {
        let kernel = kernel().await;
        let mut manager = VethManager::new(
            config(),
            Arc::new(FailingNamespaces { fail: CONTAINER }),
            kernel,
        );
        let err = manager.init().await.unwrap_err();
        assert!(
            err.to_string().starts_with("getting container namespace: "),
            "{err}"
        );
    }

    #[tokio::test]
    async fn operations_require_init() {
        let kernel = kernel().await;
        let manager = VethManager::new(config(), kernel.clone(), kernel);
        assert!(matches!(
            manager.create_pair("eth0", 1500).await,
            Err(VethError::NotInitialized)
        ));
        assert!(matches!(
            manager.destroy("eth0").await,
            Err(VethError::NotInitialized)
        ));
    }

    // -- create_pair ---------------------------------------------------------

    #[tokio::test]
    async fn create_pair_places_ends_in_their_namespaces() {
        let (kernel, manager) = setup().await;
        let pair = manager.create_pair("eth0", 1450).await.unwrap();

        assert_eq!(pair.container.link.name, "eth0");
        assert_eq!(pair.container.link.mtu, 1450);
        assert_eq!(&pair.container.namespace, manager.container_ns().unwrap());
        assert_eq!(&pair.host.namespace, manager.host_ns().unwrap());

        let host_name = &pair.host.link.name;
        assert!(host_name.starts_with("veth"), "{host_name}");
        assert_eq!(host_name.len(), 12);
        assert!(host_name[4..].chars().all(|c| c.is_ascii_hexdigit()));

        let container_ns = manager.container_ns().unwrap();
        let host_ns = manager.host_ns().unwrap();
        assert!(kernel.link_by_name(container_ns, "eth0").await.is_ok());
        assert!(kernel.link_by_name(host_ns, host_name).await.is_ok());
        assert!(kernel.link_by_name(container_ns, host_name).await.is_err());
        assert!(kernel.is_up(host_ns, host_name).await.unwrap());
        assert!(kernel.is_up(container_ns, "eth0").await.unwrap());
        assert_eq!(
            kernel.peer_of(container_ns, "eth0").await.unwrap(),
            Some((PathBuf::from(HOST), host_name.clone()))
        );
    }

    #[tokio::test]
    async fn create_pair_rejects_existing_container_name() {
        let (kernel, manager) = setup().await;
        manager.create_pair("eth0", 1500).await.unwrap();
        let host_links = kernel.list_links(manager.host_ns().unwrap()).await.unwrap();

        let err = manager.create_pair("eth0", 1500).await.unwrap_err();
        assert!(
            err.to_string()
                .contains("container veth name provided (eth0) already exists"),
            "{err}"
        );
        let after = kernel.list_links(manager.host_ns().unwrap()).await.unwrap();
        assert_eq!(after, host_links);
    }

    #[tokio::test]
    async fn create_pair_rejects_invalid_name() {
        let (_, manager) = setup().await;
        for name in ["", "a-name-longer-than-15", "eth/0", "eth 0"] {
            assert!(
                matches!(
                    manager.create_pair(name, 1500).await,
                    Err(VethError::InvalidName(_))
                ),
                "{name:?}"
            );
        }
    }

    #[tokio::test]
    async fn host_name_is_regenerated_on_collision() {
        let (kernel, mut manager) = setup().await;
        let host_ns = manager.host_ns().unwrap().clone();
        kernel
            .add_veth_pair(&host_ns, "vethaaaaaaaa", "vethaaaaaaab", 1500)
            .await
            .unwrap();
        manager.host_names = scripted_names(&["vethaaaaaaaa", "vethaaaaaaab", "vethbbbbbbbb"]);

        let pair = manager.create_pair("eth0", 1500).await.unwrap();
        assert_eq!(pair.host.link.name, "vethbbbbbbbb");
    }

    #[tokio::test]
    async fn host_name_generation_gives_up() {
        let (kernel, mut manager) = setup().await;
        let host_ns = manager.host_ns().unwrap().clone();
        kernel
            .add_veth_pair(&host_ns, "vethaaaaaaaa", "vethaaaaaaab", 1500)
            .await
            .unwrap();
        manager.host_names = Box::new(|| "vethaaaaaaaa".to_string());

        let err = manager.create_pair("eth0", 1500).await.unwrap_err();
        assert!(matches!(err, VethError::HostNameExhausted(HOST_NAME_ATTEMPTS)));
        let container_ns = manager.container_ns().unwrap();
        assert!(kernel.link_by_name(container_ns, "eth0").await.is_err());
    }

    // -- assign_ip -----------------------------------------------------------

    #[tokio::test]
    async fn assign_ip_sets_point_to_point_addresses() {
        let (kernel, manager) = setup().await;
        let pair = manager.create_pair("eth0", 1500).await.unwrap();
        manager.disable_ipv6(&pair).await.unwrap();

        manager
            .assign_ip(&pair, Ipv4Addr::new(10, 255, 4, 5))
            .await
            .unwrap();

        let host = addrs(&kernel, &pair.host, Family::All).await;
        assert_eq!(host.len(), 1);
        assert_eq!(host[0].local.to_string(), "169.254.0.1/32");
        assert_eq!(host[0].peer.unwrap().to_string(), "10.255.4.5/32");
        assert_eq!(host[0].scope, Scope::Link);

        let container = addrs(&kernel, &pair.container, Family::All).await;
        assert_eq!(container.len(), 1);
        assert_eq!(container[0].local.to_string(), "10.255.4.5/32");
        assert_eq!(container[0].peer.unwrap().to_string(), "169.254.0.1/32");
        assert_eq!(container[0].scope, Scope::Link);
    }

    #[tokio::test]
    async fn assign_ip_reports_host_parse_failure() {
        let kernel = kernel().await;
        let pair = setup_pair(&kernel).await;
        let manager = faulty(
            &kernel,
            Faults {
                parse: Some("169.254.0.1/32"),
                ..Faults::default()
            },
        )
        .await;

        let err = manager
            .assign_ip(&pair, Ipv4Addr::new(10, 255, 4, 5))
            .await
            .unwrap_err();
        assert!(
            err.to_string().starts_with("parsing host address 169.254.0.1/32: "),
            "{err}"
        );
        assert!(addrs(&kernel, &pair.host, Family::V4).await.is_empty());
    }

    #[tokio::test]
    async fn assign_ip_parses_both_sides_before_applying() {
        let kernel = kernel().await;
        let pair = setup_pair(&kernel).await;
        let manager = faulty(
            &kernel,
            Faults {
                parse: Some("10.255.4.5/32"),
                ..Faults::default()
            },
        )
        .await;

        let err = manager
            .assign_ip(&pair, Ipv4Addr::new(10, 255, 4, 5))
            .await
            .unwrap_err();
        assert!(
            err.to_string()
                .starts_with("parsing container address 10.255.4.5/32: "),
            "{err}"
        );
        assert!(addrs(&kernel, &pair.host, Family::V4).await.is_empty());
    }

    #[tokio::test]
    async fn assign_ip_reports_missing_device() {
        let kernel = kernel().await;
        let pair = setup_pair(&kernel).await;
        let manager = faulty(
            &kernel,
            Faults {
                link_by_name: true,
                ..Faults::default()
            },
        )
        .await;

        let err = manager
            .assign_ip(&pair, Ipv4Addr::new(10, 255, 4, 5))
            .await
            .unwrap_err();
        let expected = format!("find host link by name {}: ", pair.host.link.name);
        assert!(err.to_string().starts_with(&expected), "{err}");
    }

    #[tokio::test]
    async fn assign_ip_reports_add_failure() {
        let kernel = kernel().await;
        let pair = setup_pair(&kernel).await;
        let manager = faulty(
            &kernel,
            Faults {
                add_addr_on: Some(pair.host.link.name.clone()),
                ..Faults::default()
            },
        )
        .await;

        let err = manager
            .assign_ip(&pair, Ipv4Addr::new(10, 255, 4, 5))
            .await
            .unwrap_err();
        assert!(
            err.to_string().starts_with("adding host address 169.254.0.1/32: "),
            "{err}"
        );
    }

    #[tokio::test]
    async fn container_failure_keeps_host_address() {
        let kernel = kernel().await;
        let pair = setup_pair(&kernel).await;
        let manager = faulty(
            &kernel,
            Faults {
                add_addr_on: Some("eth0".into()),
                ..Faults::default()
            },
        )
        .await;

        let err = manager
            .assign_ip(&pair, Ipv4Addr::new(10, 255, 4, 5))
            .await
            .unwrap_err();
        assert!(
            err.to_string()
                .starts_with("adding container address 10.255.4.5/32: "),
            "{err}"
        );
        assert_eq!(addrs(&kernel, &pair.host, Family::V4).await.len(), 1);
        assert!(addrs(&kernel, &pair.container, Family::V4).await.is_empty());
    }

    async fn setup_pair(kernel: &Arc<MemoryKernel>) -> VethPair {
        let manager = initialized(kernel.clone(), kernel.clone()).await;
        let pair = manager.create_pair("eth0", 1500).await.unwrap();
        manager.disable_ipv6(&pair).await.unwrap();
        pair
    }

    // -- disable_ipv6 ---------------------------------------------------------

    #[tokio::test]
    async fn disable_ipv6_removes_every_ipv6_address() {
        let (kernel, manager) = setup().await;
        let pair = manager.create_pair("eth0", 1500).await.unwrap();
        assert_eq!(addrs(&kernel, &pair.host, Family::V6).await.len(), 1);

        for extra in ["fd00::5/64", "fd00::6/64"] {
            kernel
                .add_addr(
                    &pair.container.namespace,
                    &pair.container.link,
                    &Addr::parse(extra).unwrap(),
                )
                .await
                .unwrap();
        }
        assert_eq!(addrs(&kernel, &pair.container, Family::V6).await.len(), 3);

        manager.disable_ipv6(&pair).await.unwrap();
        assert!(addrs(&kernel, &pair.host, Family::All).await.is_empty());
        assert!(addrs(&kernel, &pair.container, Family::All).await.is_empty());
    }

    #[tokio::test]
    async fn disable_ipv6_is_idempotent_and_keeps_ipv4() {
        let (kernel, manager) = setup().await;
        let pair = manager.create_pair("eth0", 1500).await.unwrap();
        manager.disable_ipv6(&pair).await.unwrap();
        manager
            .assign_ip(&pair, Ipv4Addr::new(10, 255, 4, 5))
            .await
            .unwrap();

        manager.disable_ipv6(&pair).await.unwrap();
        assert!(addrs(&kernel, &pair.host, Family::V6).await.is_empty());
        assert_eq!(addrs(&kernel, &pair.container, Family::V4).await.len(), 1);
    }

    // -- destroy ----------------------------------------------------------------

    #[tokio::test]
    async fn destroy_by_container_name_removes_pair() {
        let (kernel, manager) = setup().await;
        let pair = manager.create_pair("eth0", 1500).await.unwrap();

        manager.destroy("eth0").await.unwrap();
        let container_ns = manager.container_ns().unwrap();
        let host_ns = manager.host_ns().unwrap();
        let err = kernel.link_by_name(container_ns, "eth0").await.unwrap_err();
        assert!(err.to_string().contains("not found"), "{err}");
        assert!(kernel.link_by_name(host_ns, &pair.host.link.name).await.is_err());
    }

    #[tokio::test]
    async fn destroy_by_host_name() {
        let (kernel, manager) = setup().await;
        let pair = manager.create_pair("eth0", 1500).await.unwrap();

        manager.destroy(&pair.host.link.name).await.unwrap();
        let container_ns = manager.container_ns().unwrap();
        assert!(kernel.link_by_name(container_ns, "eth0").await.is_err());
    }

    #[tokio::test]
    async fn destroy_unknown_link_names_it() {
        let (_, manager) = setup().await;
        let err = manager.destroy("wrong-name").await.unwrap_err();
        assert_eq!(err.to_string(), "link not found: wrong-name");
    }

    #[tokio::test]
    async fn manager_is_reusable_across_cycles() {
        let (_, manager) = setup().await;
        for _ in 0..3 {
            let pair = manager.create_pair("eth0", 1500).await.unwrap();
            manager.disable_ipv6(&pair).await.unwrap();
            manager
                .assign_ip(&pair, Ipv4Addr::new(10, 255, 4, 5))
                .await
                .unwrap();
            manager.destroy("eth0").await.unwrap();
        }
    }

    #[test]
    fn random_host_names_are_short_hex() {
        let name = random_host_name();
        assert!(validate_link_name(&name).is_ok());
        assert_eq!(name.len(), 12);
        assert_ne!(random_host_name(), random_host_name());
    }
}
