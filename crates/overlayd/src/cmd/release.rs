use clap::Args;

use super::{ConfigArgs, connect, release_local_lease};
use crate::error::DaemonResult;

#[derive(Args)]
pub struct ReleaseArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

pub async fn run_release(args: ReleaseArgs) -> DaemonResult<()> {
    let (config, controller) = connect(&args.config).await?;
    release_local_lease(&controller, config.host_identifier()).await
}
