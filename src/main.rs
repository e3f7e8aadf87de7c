use std::{str::FromStr, sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::get,
};
use chirp::{
    AppState, Config, IdentityProvider, RateLimiter, RenderCache, api, auth,
    identity::HttpIdentityProvider,
    index, limiter,
    limiter::SlidingWindow,
    posts, profiles,
};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::{
    net::TcpListener,
    signal::{
        ctrl_c,
        unix::{SignalKind, signal},
    },
};
use tower_http::cors::CorsLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Arc::new(Config::load());

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(5)));

    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(&config.database_url)
        .await
        .expect("Database unreachable");
    sqlx::migrate!()
        .run(&db_pool)
        .await
        .expect("Migrations failed");

    let redis = limiter::init_redis(&config.redis_url).await;
    let limiter: Arc<dyn RateLimiter> =
        Arc::new(SlidingWindow::new(redis, 3, Duration::from_secs(60)));
    let identity: Arc<dyn IdentityProvider> = Arc::new(HttpIdentityProvider::new(&config));

    let clients = match std::fs::read_to_string(&config.client_secret_path) {
        Ok(raw) => {
            let json = serde_json::Value::from_str(&raw).expect("Invalid client secret file");
            auth::Clients::from_json(json, &config.public_url).expect("OAuth misconfigured")
        }
        Err(err) => {
            warn!(%err, "no client secret file, sign-in disabled");
            auth::Clients::disabled()
        }
    };

    let app_state = AppState {
        db_pool,
        identity,
        limiter,
        clients,
        cache: RenderCache::new(Duration::from_secs(1)),
        config: config.clone(),
    };

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    let app = Router::new()
        .route("/", get(index::index))
        .route("/post/{id}", get(posts::page::post_page))
        .route("/{slug}", get(profiles::page::profile_page))
        .merge(auth::router())
        .nest("/api", api::router(app_state.clone()))
        .with_state(app_state)
        .layer(session_layer)
        .layer(cors);

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address).await.expect("Bind failed");
    info!("Listening on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server crashed");

    info!("Server shutting down");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
