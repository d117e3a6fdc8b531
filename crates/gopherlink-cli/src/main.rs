// gopherlink CLI entry point

use clap::Parser;
use gopherlink_cli::{commands, logging, output::OutputStyle, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.as_deref(), cli.verbose);

    if let Err(e) = commands::run(cli).await {
        eprintln!("{}", OutputStyle::default().error(&format!("{:#}", e)));
        std::process::exit(1);
    }
}
