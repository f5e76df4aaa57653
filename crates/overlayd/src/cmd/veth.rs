use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Subcommand};
use overlay_veth::{FsNamespaceAdapter, IpCommandAdapter, VethManager};
use tracing::{info, warn};

use super::ConfigArgs;
use crate::config;
use crate::error::DaemonResult;

/// Network namespace of the host's init process.
const DEFAULT_HOST_NS: &str = "/proc/1/ns/net";

#[derive(Args)]
pub struct VethArgs {
    #[command(subcommand)]
    command: VethCommand,
}

#[derive(Subcommand)]
enum VethCommand {
    /// Create a veth pair, disable IPv6 on it and assign point-to-point addresses
    Create(CreateArgs),
    /// Delete a veth pair by the name of either end
    Destroy(DestroyArgs),
}

#[derive(Args)]
struct NamespaceArgs {
    /// Host network namespace path
    #[arg(long, default_value = DEFAULT_HOST_NS)]
    host_ns: PathBuf,
    /// Container network namespace path
    #[arg(long)]
    container_ns: PathBuf,
}

#[derive(Args)]
struct CreateArgs {
    #[command(flatten)]
    config: ConfigArgs,
    #[command(flatten)]
    namespaces: NamespaceArgs,
    /// Interface name inside the container
    #[arg(long, default_value = "eth0")]
    name: String,
    /// Container overlay IP
    #[arg(long)]
    ip: Ipv4Addr,
    /// MTU for both ends (overrides config)
    #[arg(long)]
    mtu: Option<u32>,
}

#[derive(Args)]
struct DestroyArgs {
    #[command(flatten)]
    config: ConfigArgs,
    #[command(flatten)]
    namespaces: NamespaceArgs,
    /// Name of either end of the pair
    #[arg(long)]
    name: String,
}

pub async fn run_veth(args: VethArgs) -> DaemonResult<()> {
    if !nix::unistd::geteuid().is_root() {
        warn!("not running as root: link and namespace changes need CAP_NET_ADMIN");
    }
    match args.command {
        VethCommand::Create(args) => create(args).await,
        VethCommand::Destroy(args) => destroy(args).await,
    }
}

async fn init_manager(
    config: &ConfigArgs,
    namespaces: NamespaceArgs,
) -> DaemonResult<(VethManager, u32)> {
    let config = config::load(&config.config).await?;
    let mut manager = VethManager::new(
        config::veth_manager_config(namespaces.host_ns, namespaces.container_ns),
        Arc::new(FsNamespaceAdapter),
        Arc::new(IpCommandAdapter::new(config.veth.privilege)),
    );
    manager.init().await?;
    Ok((manager, config.veth.mtu))
}

async fn create(args: CreateArgs) -> DaemonResult<()> {
    let (manager, default_mtu) = init_manager(&args.config, args.namespaces).await?;
    let mtu = args.mtu.unwrap_or(default_mtu);

    let pair = manager.create_pair(&args.name, mtu).await?;
    manager.disable_ipv6(&pair).await?;
    manager.assign_ip(&pair, args.ip).await?;

    info!(
        host = %pair.host.link.name,
        container = %pair.container.link.name,
        ip = %args.ip,
        "container wired"
    );
    println!("{}", serde_json::to_string_pretty(&pair)?);
    Ok(())
}

async fn destroy(args: DestroyArgs) -> DaemonResult<()> {
    let (manager, _) = init_manager(&args.config, args.namespaces).await?;
    manager.destroy(&args.name).await?;
    Ok(())
}
