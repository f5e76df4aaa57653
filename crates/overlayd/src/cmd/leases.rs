use clap::Args;

use super::{ConfigArgs, connect};
use crate::error::DaemonResult;

#[derive(Args)]
pub struct LeasesArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

/// Print every routable lease as a JSON array.
pub async fn run_leases(args: LeasesArgs) -> DaemonResult<()> {
    let (_, controller) = connect(&args.config).await?;
    let leases = controller.routable_leases().await?;
    println!("{}", serde_json::to_string_pretty(&leases)?);
    Ok(())
}
