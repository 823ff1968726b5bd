use clap::Parser;
use rdv_cli::{cli::Cli, logging, watch};
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    if let Err(err) = watch::run(cli).await {
        error!(target = "rdv", error = %err, "watch failed");
        std::process::exit(1);
    }
}
