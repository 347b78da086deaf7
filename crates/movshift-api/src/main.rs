use movshift_api::setup;
use movshift_core::Config;

// Use mimalloc as the global allocator for lower fragmentation under large streaming uploads.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (telemetry, stores, services, routes)
    let (state, router) = setup::initialize_app(config.clone()).await?;

    // The sweep runs for the lifetime of the server
    let janitor = state.janitor.clone().start();

    setup::server::start_server(&config, router).await?;

    janitor.stop().await;
    tracing::info!("Shutdown complete");

    Ok(())
}
