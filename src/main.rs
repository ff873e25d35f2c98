//! StackSafe HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use stacksafe::cache::{FileKv, ResponseCache};
use stacksafe::clock::system_clock;
use stacksafe::config::Config;
use stacksafe::gateway::{AppState, create_router_with_state};
use stacksafe::interactions::InteractionEngine;
use stacksafe::maintenance::{CacheOptimizeTask, MaintenanceScheduler, RuleRefreshTask};
use stacksafe::router::{AnalysisPayload, GenaiAnalyzer, StaticNetworkStatus, TierRouter};
use stacksafe::rules::{HttpRuleSource, RuleEvaluator, RuleRepository};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        model = %config.analysis_model,
        offline = config.offline,
        "StackSafe starting"
    );

    let repository = Arc::new(match &config.rules_url {
        Some(url) => {
            tracing::info!(url = %url, "Remote rule source configured");
            RuleRepository::with_source(Arc::new(HttpRuleSource::new(url.clone())))
        }
        None => RuleRepository::builtin(),
    });
    let refresh = repository.refresh().await;
    tracing::info!(outcome = ?refresh, "Initial rule refresh");
    let evaluator = RuleEvaluator::new(Arc::clone(&repository));

    let cache: ResponseCache<AnalysisPayload> = if config.persist_cache {
        tokio::fs::create_dir_all(&config.storage_path).await?;
        let kv = Arc::new(FileKv::new(config.storage_path.clone()));
        let cache = ResponseCache::with_persistence(config.cache.clone(), kv, system_clock());
        match cache.load_persisted().await {
            Ok(restored) => tracing::info!(restored, "Response cache restored"),
            Err(e) => tracing::warn!("Failed to restore response cache: {}. Starting empty.", e),
        }
        cache
    } else {
        ResponseCache::new(config.cache.clone())
    };

    let network = Arc::new(StaticNetworkStatus::new(config.offline));
    let analyzer = Arc::new(GenaiAnalyzer::new(config.analysis_model.clone()));
    let router = Arc::new(
        TierRouter::new(evaluator.clone(), cache.clone(), analyzer)
            .with_network(network)
            .with_config(config.router.clone()),
    );
    let engine = Arc::new(InteractionEngine::with_default_checkers(
        evaluator,
        config.engine.clone(),
    ));

    let scheduler = Arc::new(
        MaintenanceScheduler::new(config.maintenance.clone())
            .with_task(Arc::new(CacheOptimizeTask::new(cache.clone())))
            .with_task(Arc::new(RuleRefreshTask::new(repository))),
    );
    scheduler.start();

    let app = create_router_with_state(AppState::new(router, engine));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&scheduler), cache))
        .await?;

    tracing::info!("StackSafe shutdown complete");
    Ok(())
}

fn run_health_check() -> i32 {
    let port = std::env::var("STACKSAFE_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let url = format!("http://127.0.0.1:{}/healthz", port);

    let Ok(rt) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return 1;
    };

    rt.block_on(async {
        let Ok(client) = reqwest::Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
        else {
            return 1;
        };

        match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => 0,
            _ => 1,
        }
    })
}

async fn shutdown_signal(
    scheduler: Arc<MaintenanceScheduler>,
    cache: ResponseCache<AnalysisPayload>,
) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }

    scheduler.shutdown().await;
    tracing::info!("Flushing response cache...");
    cache.shutdown().await;
}
