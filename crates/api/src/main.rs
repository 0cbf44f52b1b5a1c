use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use acera_core::analysis::aggregator::Aggregator;
use acera_core::report::ReportBuilder;

mod error;
mod routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = acera_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let services = settings.configured_services();
    if !services.alpha_vantage || !services.perplexity || !services.openai {
        tracing::warn!(?services, "some upstream keys missing; starting API in degraded mode");
    }

    let aggregator = Aggregator::from_settings(&settings)?;
    tracing::info!(
        market = aggregator.market().provider_name(),
        news = aggregator.news().provider_name(),
        "upstream providers ready"
    );
    let state = routes::AppState {
        reports: ReportBuilder::from_settings(aggregator, &settings),
        services,
    };
    let app = routes::router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, environment = settings.environment.as_deref().unwrap_or("development"), "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &acera_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: settings.environment.clone().map(Into::into),
            ..Default::default()
        },
    )))
}
