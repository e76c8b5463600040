use clap::{arg, command};
use tracing::info;
use tracing_subscriber::EnvFilter;

use abi::config::Config;

#[tokio::main]
async fn main() {
    let matches = command!()
        .arg(
            arg!(-c --config <FILE> "configuration file path")
                .default_value("./abi/fixtures/blog.yml"),
        )
        .get_matches();

    // init tracing
    tracing_subscriber::fmt()
        .with_line_number(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    let path = matches
        .get_one::<String>("config")
        .expect("config has a default");
    let config = Config::load(path).unwrap();

    info!("starting api server on {}", config.server.server_url());
    if let Err(e) = api::start(config).await {
        panic!("failed to start api server: {e}");
    }
}
