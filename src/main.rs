use std::sync::Arc;

use concierge::api::{api_routes, ApiState};
use concierge::browser::{CheckoutProfile, RemoteBrowser, SessionStore};
use concierge::config::{ReaperConfig, WorkerConfig};
use concierge::executors::{RideBookingExecutor, StorefrontOrderExecutor};
use concierge::onramp::{OnrampClient, OnrampCredentials};
use concierge::oracle::{AnthropicOracle, DEFAULT_MODEL};
use concierge::search::ProductSearch;
use concierge::store::{LibSqlStore, TaskStore};
use concierge::worker::{spawn_reaper_loop, ExecutorRegistry, WorkerLoop};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_else(|_| {
        eprintln!("Error: ANTHROPIC_API_KEY not set");
        eprintln!("  export ANTHROPIC_API_KEY=sk-ant-...");
        std::process::exit(1);
    });

    let model =
        std::env::var("CONCIERGE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

    let port: u16 = std::env::var("CONCIERGE_PORT")
        .unwrap_or_else(|_| "8000".to_string())
        .parse()
        .unwrap_or(8000);

    let worker_config = WorkerConfig::from_env();
    let reaper_config = ReaperConfig::from_env();

    eprintln!("🛒 Concierge v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Worker: {}", worker_config.worker_id);
    eprintln!("   Oracle model: {}", model);
    eprintln!("   API: http://0.0.0.0:{}/tasks", port);

    // ── Task store ───────────────────────────────────────────────────────
    let db_path =
        std::env::var("CONCIERGE_DB_PATH").unwrap_or_else(|_| "./data/concierge.db".to_string());
    let store: Arc<dyn TaskStore> = Arc::new(
        LibSqlStore::new_local(std::path::Path::new(&db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", db_path, e);
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", db_path);

    // ── Executor collaborators ───────────────────────────────────────────
    let oracle = Arc::new(
        AnthropicOracle::new(secrecy::SecretString::from(api_key)).with_model(model),
    );

    let browser_url = std::env::var("CONCIERGE_BROWSER_AGENT_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8700".to_string());
    let browser = Arc::new(RemoteBrowser::new(browser_url.clone()));
    eprintln!("   Browser agent: {}", browser_url);

    let session_dir = std::env::var("CONCIERGE_SESSION_DIR")
        .unwrap_or_else(|_| "./data/sessions".to_string());
    let sessions = Arc::new(SessionStore::new(session_dir.clone()));
    eprintln!("   Sessions: {}", session_dir);

    let profile_path = std::env::var("CONCIERGE_CHECKOUT_PROFILE")
        .unwrap_or_else(|_| "./data/checkout_profile.json".to_string());
    let profile = CheckoutProfile::load(std::path::Path::new(&profile_path))
        .await
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("  A checkout profile JSON file is required for storefront orders.");
            std::process::exit(1);
        });
    eprintln!("   Checkout profile: {}", profile_path);

    // ── Executors ────────────────────────────────────────────────────────
    let mut registry = ExecutorRegistry::new();
    registry.register(Arc::new(RideBookingExecutor::new(
        oracle.clone(),
        browser.clone(),
        sessions,
    )));
    registry.register(Arc::new(StorefrontOrderExecutor::new(
        oracle,
        browser,
        profile,
    )?));
    let registry = Arc::new(registry);
    eprintln!("   Executors: {} registered", registry.count());

    // ── Optional side services ───────────────────────────────────────────
    let onramp = OnrampCredentials::from_env().map(|credentials| {
        eprintln!("   Onramp: enabled");
        Arc::new(OnrampClient::new(credentials))
    });
    if onramp.is_none() {
        eprintln!("   Onramp: disabled (no credentials)");
    }

    let search = std::env::var("EXA_API").ok().map(|key| {
        eprintln!("   Search: enabled");
        Arc::new(ProductSearch::new(secrecy::SecretString::from(key)))
    });
    if search.is_none() {
        eprintln!("   Search: disabled (EXA_API not set)");
    }

    // ── API server ───────────────────────────────────────────────────────
    let app = api_routes(ApiState {
        store: store.clone(),
        onramp,
        search,
    });
    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
            .await
            .expect("Failed to bind API port");
        tracing::info!(port, "API server started");
        axum::serve(listener, app).await.ok();
    });

    // ── Reaper ───────────────────────────────────────────────────────────
    let _reaper_handle = spawn_reaper_loop(store.clone(), reaper_config);

    // ── Worker loop (runs until ctrl-c, then drains) ─────────────────────
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received; draining in-flight tasks");
            let _ = shutdown_tx.send(true);
        }
    });

    let worker = WorkerLoop::new(store, registry, worker_config);
    worker.run(shutdown_rx).await;

    Ok(())
}
