use imagegate_core::HandlerConfig;

// Use mimalloc as the global allocator; decode/encode churn through large buffers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = HandlerConfig::from_env()?;

    // Build storage, detection and the pipeline, then the router
    let (_handler, router) = imagegate_api::setup::initialize_app(config.clone()).await?;

    // Start the server
    imagegate_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
