use clap::Parser;
use tracing::error;

use proxy_exec::cli::Cli;
use proxy_exec::report;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Usage errors exit with status 2, -h and -V with 0
    let (config, command) = Cli::parse().into_parts();
    let program = report::program_name();

    if let Err(e) = report::init(&config, &program) {
        eprintln!("{}: {}", program, e);
        std::process::exit(1);
    }

    // Exit without tearing down the runtime: a header read that lost the
    // race against the deadline may still be blocked on stdin.
    match proxy_exec::run(&config, command).await {
        Ok(never) => match never {},
        Err(e) => {
            error!("{}", e);
            std::process::exit(e.exit_code());
        }
    }
}
