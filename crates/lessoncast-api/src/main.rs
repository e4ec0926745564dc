use anyhow::Context;
use lessoncast_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env().context("Failed to load configuration")?;

    let (state, router) = lessoncast_api::setup::initialize_app(config).await?;

    lessoncast_api::setup::server::start_server(state, router)
        .await
        .context("Server terminated with an error")?;

    Ok(())
}
