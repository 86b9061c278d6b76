use anyhow::{bail, Result};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let gateway = kairo_gateway::build().await?;
    tracing::info!(admin_guild = %gateway.settings.admin_guild_id, "kairo gateway starting");

    let report = gateway.dispatcher.on_startup_reconcile_all().await?;
    kairo_gateway::log_report(&report);

    if !report.privileged_ok() {
        bail!("privileged command sync failed");
    }

    Ok(())
}
