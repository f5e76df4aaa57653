use std::fmt;
use std::fs::File;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// Handle to a network namespace, identified by its bind-mount path.
///
/// The optional file keeps the namespace pinned for as long as any clone of
/// the handle is alive. Handles compare equal when their paths match.
#[derive(Debug, Clone, Serialize)]
pub struct NetNs {
    path: PathBuf,
    #[serde(skip)]
    file: Option<Arc<File>>,
}

impl NetNs {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub(crate) fn pinned(path: impl Into<PathBuf>, file: File) -> Self {
        Self {
            path: path.into(),
            file: Some(Arc::new(file)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_pinned(&self) -> bool {
        self.file.is_some()
    }
}

impl PartialEq for NetNs {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for NetNs {}

/// Link attributes as reported by the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub index: u32,
    pub name: String,
    pub mtu: u32,
    pub hardware_address: Option<String>,
}

/// Address family filter for address listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    All,
    V4,
    V6,
}

impl Family {
    pub fn matches(self, net: &IpNet) -> bool {
        match self {
            Self::All => true,
            Self::V4 => matches!(net, IpNet::V4(_)),
            Self::V6 => matches!(net, IpNet::V6(_)),
        }
    }
}

/// Address scope, named the way `ip` prints it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    #[serde(rename = "global")]
    Universe,
    Site,
    Link,
    Host,
    Nowhere,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Universe => "global",
            Self::Site => "site",
            Self::Link => "link",
            Self::Host => "host",
            Self::Nowhere => "nowhere",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "global" | "universe" => Some(Self::Universe),
            "site" => Some(Self::Site),
            "link" => Some(Self::Link),
            "host" => Some(Self::Host),
            "nowhere" => Some(Self::Nowhere),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An interface address, optionally point-to-point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addr {
    pub local: IpNet,
    pub peer: Option<IpNet>,
    pub scope: Scope,
}

impl Addr {
    /// Parse `ip/prefix` or a bare IP (host prefix) into a global-scope
    /// address with no peer.
    pub fn parse(s: &str) -> Result<Self, AdapterError> {
        let invalid = |reason: String| AdapterError::InvalidAddress {
            addr: s.to_string(),
            reason,
        };
        let local = match s.parse::<IpNet>() {
            Ok(net) => net,
            Err(net_err) => s
                .parse::<IpAddr>()
                .map(IpNet::from)
                .map_err(|_| invalid(net_err.to_string()))?,
        };
        Ok(Self {
            local,
            peer: None,
            scope: Scope::Universe,
        })
    }

    pub fn with_peer(mut self, peer: IpNet) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.local)?;
        if let Some(peer) = &self.peer {
            write!(f, " peer {peer}")?;
        }
        write!(f, " scope {}", self.scope)
    }
}

/// One end of a veth pair and the namespace that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VethEnd {
    pub link: Link,
    pub namespace: NetNs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VethPair {
    pub host: VethEnd,
    pub container: VethEnd,
}
