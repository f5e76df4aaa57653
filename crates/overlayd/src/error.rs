#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("lease error: {0}")]
    Lease(#[from] overlay_lease::LeaseError),

    #[error("veth error: {0}")]
    Veth(#[from] overlay_veth::VethError),

    #[error("config error: {0}")]
    Config(String),

    #[error("encoding output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DaemonResult<T> = Result<T, DaemonError>;
