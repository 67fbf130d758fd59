mod api_doc;
mod error;
mod handlers;
mod setup;
mod state;

use gala_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    setup::init_tracing();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (database, fetcher, routes)
    let (_state, router) = setup::initialize_app(config.clone()).await?;

    // Start the server
    setup::server::start_server(&config, router).await?;

    Ok(())
}
