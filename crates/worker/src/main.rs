use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cardwise_core::domain::catalog::Catalog;
use cardwise_core::ingest::provider::{CardCatalogProvider, HttpJsonCatalogProvider};

mod seed;

#[derive(Debug, Parser)]
#[command(name = "cardwise_worker")]
struct Args {
    /// Use the built-in seed catalog instead of the configured HTTP feed.
    #[arg(long)]
    seed: bool,

    /// Do everything except writing to the database.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = cardwise_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let source: &'static str = if args.seed {
        seed::SEED_SOURCE
    } else {
        "external_http_json"
    };

    let fetch_result: anyhow::Result<(Catalog, serde_json::Value)> = if args.seed {
        seed::build_seed_catalog()
    } else {
        let provider = HttpJsonCatalogProvider::from_settings(&settings)?;
        provider.fetch_catalog().await
    };

    if args.dry_run {
        return match fetch_result {
            Ok((catalog, _)) => {
                tracing::info!(
                    source,
                    dry_run = true,
                    cards = catalog.cards.len(),
                    rules = catalog.rule_count(),
                    programs = catalog.programs.len(),
                    "catalog refresh (dry-run)"
                );
                Ok(())
            }
            Err(err) => {
                tracing::error!(source, dry_run = true, error = %err, "catalog fetch failed (dry-run)");
                Err(err)
            }
        };
    }

    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    cardwise_core::storage::migrate(&pool).await?;

    let acquired = cardwise_core::storage::lock::try_acquire_refresh_lock(&pool).await?;
    if !acquired {
        tracing::warn!("refresh lock not acquired; another run in progress");
        return Ok(());
    }

    match fetch_result {
        Ok((catalog, raw_feed)) => {
            let snapshot_id = cardwise_core::storage::catalog::persist_success(
                &pool,
                &catalog,
                source,
                Some(raw_feed),
            )
            .await?;

            tracing::info!(
                %snapshot_id,
                source,
                cards = catalog.cards.len(),
                rules = catalog.rule_count(),
                "persisted catalog snapshot"
            );
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            let snapshot_id = cardwise_core::storage::catalog::persist_failure(
                &pool,
                source,
                &format!("{:#}", err),
                None,
            )
            .await?;

            tracing::error!(%snapshot_id, source, error = %err, "catalog refresh failed");
        }
    }

    let _ = cardwise_core::storage::lock::release_refresh_lock(&pool).await;
    Ok(())
}

fn init_sentry(settings: &cardwise_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
