mod leases;
mod release;
mod start;
mod veth;

use std::path::PathBuf;

use clap::Args;
use overlay_lease::LeaseController;
use tracing::warn;

use crate::config::{self, OverlayConfig};
use crate::error::DaemonResult;

pub use leases::{LeasesArgs, run_leases};
pub use release::{ReleaseArgs, run_release};
pub use start::{StartArgs, run_start};
pub use veth::{VethArgs, run_veth};

#[derive(Args)]
pub struct ConfigArgs {
    /// Path to overlayd.yaml config file
    #[arg(long, short, env = "OVERLAYD_CONFIG")]
    pub config: PathBuf,
}

/// Load the config and connect a migrated lease controller.
async fn connect(args: &ConfigArgs) -> DaemonResult<(OverlayConfig, LeaseController)> {
    let config = config::load(&args.config).await?;
    let controller = LeaseController::connect(&config.lease_settings()).await?;
    Ok((config, controller))
}

/// Release this host's lease. A missing lease is only worth a warning.
async fn release_local_lease(controller: &LeaseController, host: &str) -> DaemonResult<()> {
    match controller.release_lease(host).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            warn!(host, error = %e, "no lease to release");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
