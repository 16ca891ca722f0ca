use anyhow::Context;
use biblio_app::App;
use biblio_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load settings")?;
    biblio_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.endpoint,
        "biblio-app bootstrap starting"
    );

    let app = App::build(settings).await?;

    tracing::info!("biblio-app bootstrap complete");
    app.serve().await
}
