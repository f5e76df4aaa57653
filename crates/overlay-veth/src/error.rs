use std::fmt;
use std::path::PathBuf;

use crate::command::CommandError;

/// Which end of a veth pair an operation was acting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Host,
    Container,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Container => f.write_str("container"),
        }
    }
}

/// Error from a [`NamespaceAdapter`](crate::NamespaceAdapter) or
/// [`NetlinkAdapter`](crate::NetlinkAdapter) primitive.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("link not found: {0}")]
    LinkNotFound(String),

    #[error("link already exists: {0}")]
    LinkExists(String),

    #[error("network namespace not found: {}", .0.display())]
    NamespaceNotFound(PathBuf),

    #[error("invalid address {addr:?}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("address {addr} already assigned to {link}")]
    AddressExists { addr: String, link: String },

    #[error("address {addr} not assigned to {link}")]
    AddressNotFound { addr: String, link: String },

    #[error("decoding ip output: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("opening {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AdapterError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::LinkNotFound(_) | Self::NamespaceNotFound(_) | Self::AddressNotFound { .. }
        )
    }
}

/// Error from a [`VethManager`](crate::VethManager) operation.
#[derive(Debug, thiserror::Error)]
pub enum VethError {
    #[error("veth manager used before init")]
    NotInitialized,

    #[error("getting {side} namespace: {source}")]
    Namespace {
        side: Side,
        #[source]
        source: AdapterError,
    },

    #[error("invalid container veth name {0:?}")]
    InvalidName(String),

    #[error("container veth name provided ({0}) already exists")]
    AlreadyExists(String),

    #[error("listing {side} links: {source}")]
    ListLinks {
        side: Side,
        #[source]
        source: AdapterError,
    },

    #[error("no free host veth name after {0} attempts")]
    HostNameExhausted(u32),

    #[error("creating veth pair {name}/{peer}: {source}")]
    CreatePair {
        name: String,
        peer: String,
        #[source]
        source: AdapterError,
    },

    #[error("moving {name} to host namespace: {source}")]
    MoveLink {
        name: String,
        #[source]
        source: AdapterError,
    },

    #[error("setting {side} link {name} up: {source}")]
    LinkUp {
        side: Side,
        name: String,
        #[source]
        source: AdapterError,
    },

    #[error("parsing {side} address {addr}: {source}")]
    ParseAddress {
        side: Side,
        addr: String,
        #[source]
        source: AdapterError,
    },

    #[error("find {side} link by name {name}: {source}")]
    FindLink {
        side: Side,
        name: String,
        #[source]
        source: AdapterError,
    },

    #[error("adding {side} address {addr}: {source}")]
    AddAddress {
        side: Side,
        addr: String,
        #[source]
        source: AdapterError,
    },

    #[error("listing {side} addresses on {name}: {source}")]
    ListAddresses {
        side: Side,
        name: String,
        #[source]
        source: AdapterError,
    },

    #[error("removing {side} address {addr}: {source}")]
    RemoveAddress {
        side: Side,
        addr: String,
        #[source]
        source: AdapterError,
    },

    #[error("link not found: {0}")]
    LinkNotFound(String),

    #[error("deleting link {name}: {source}")]
    DeleteLink {
        name: String,
        #[source]
        source: AdapterError,
    },
}
