//! Standalone migration runner: applies all pending migrations against the
//! configured database and exits.

use anyhow::Context;
use tracing::info;

use rfq_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("loading configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("connecting to database")?;

    api::db::run_migrations(&pool)
        .await
        .context("running migrations")?;

    info!("migrations applied");
    Ok(())
}
