mod app;
mod cli;

use clap::Parser;

fn main() {
    let cli = cli::Cli::parse();

    let default_filter = if cli.verbose {
        "avcbatch=debug"
    } else {
        "avcbatch=info"
    };
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    app::run(cli);
}
