use clap::Args;
use tracing::info;

use super::{ConfigArgs, connect, release_local_lease};
use crate::error::DaemonResult;

#[derive(Args)]
pub struct StartArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

/// Acquire (or renew) this host's lease, hold it until SIGINT/SIGTERM, then
/// release it.
pub async fn run_start(args: StartArgs) -> DaemonResult<()> {
    let (config, controller) = connect(&args.config).await?;
    let host = config.host_identifier();

    let lease = controller.acquire_lease(host).await?;
    info!(
        host,
        subnet = %lease.overlay_subnet,
        gateway = %lease.gateway_ip(),
        vtep_mac = %lease.overlay_hardware_address,
        "holding lease"
    );

    let routable = controller.routable_leases().await?;
    info!(count = routable.len(), "routable leases");

    wait_for_shutdown().await;
    release_local_lease(&controller, host).await
}

async fn wait_for_shutdown() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).ok();
    let mut sigint = signal(SignalKind::interrupt()).ok();

    tokio::select! {
        _ = recv_signal(&mut sigterm) => {
            info!("received SIGTERM, releasing lease");
        }
        _ = recv_signal(&mut sigint) => {
            info!("received SIGINT, releasing lease");
        }
    }
}

/// Await a signal if registered, or pend forever if registration failed.
async fn recv_signal(sig: &mut Option<tokio::signal::unix::Signal>) {
    match sig {
        Some(s) => {
            s.recv().await;
        }
        None => std::future::pending().await,
    }
}
