use foodgram::{server::start_server, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load()?;
    log::info!(
        "Starting Foodgram on port {} (anonymous filters: {})",
        config.port,
        config.anonymous_filter_policy
    );

    start_server(config).await
}
