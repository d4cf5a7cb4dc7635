use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use besties_guide::config::{GuideConfig, HostConfig};
use besties_guide::navigation::{FixedPermission, LoggingNavigator, PermissionOutcome};
use besties_guide::onboarding::{
    OnboardingOrchestrator, OnboardingRouteState, default_deck, onboarding_routes,
};
use besties_guide::profile::MemoryProfileStore;
use besties_guide::services::GuideServices;
use besties_guide::storage::{FlagStore, JsonFileStorage};
use besties_guide::transition::{NoopEffects, TransitionCoordinator, VirtualStage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let host = HostConfig::from_env();

    // Initialize tracing, optionally tee'd to a daily log file
    let (file_layer, _log_guard) = match &host.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "besties-guide.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    let config = GuideConfig::from_env();

    eprintln!("Besties guide v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/guide/onboarding", host.http_port);
    eprintln!("   Flags: {}", host.state_path.display());
    eprintln!("   User: {}", host.user_id);
    eprintln!("   Default effect: {}", config.default_effect);

    let flags = FlagStore::new(Arc::new(JsonFileStorage::new(&host.state_path)));
    let services = GuideServices::new(
        Arc::new(MemoryProfileStore::new()),
        flags.clone(),
        Arc::new(LoggingNavigator),
    );
    // Headless host: no rendered regions, so every transition is instant.
    let coordinator = TransitionCoordinator::new(Arc::new(VirtualStage::new()), Arc::new(NoopEffects));
    let permissions = Arc::new(FixedPermission(PermissionOutcome::Unavailable));

    let launched = OnboardingOrchestrator::launch(
        host.user_id.clone(),
        &config,
        coordinator.clone(),
        services.clone(),
        permissions.clone(),
    )
    .await
    .context("Failed to start onboarding")?;
    let orchestrator = match launched {
        Some(orchestrator) => orchestrator,
        None => {
            tracing::info!("Onboarding already handled; serving a replay session");
            OnboardingOrchestrator::with_deck(
                host.user_id.clone(),
                default_deck(),
                &config,
                coordinator,
                services,
                permissions,
            )
            .context("Failed to build onboarding deck")?
        }
    };

    let app = onboarding_routes(OnboardingRouteState {
        orchestrator: Arc::new(orchestrator),
        flags,
    })
    .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", host.http_port))
        .await
        .with_context(|| format!("Failed to bind port {}", host.http_port))?;
    tracing::info!(port = host.http_port, "Guide API server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("Guide API server failed")?;

    Ok(())
}
