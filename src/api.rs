//! The `/api` surface: every procedure of the post and profile routers,
//! wrapped in the timing middleware.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
};
use rand::Rng;
use tracing::info;

use crate::{AppState, Config, posts, profiles};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(posts::rpc::router())
        .merge(profiles::rpc::router())
        .layer(middleware::from_fn_with_state(state, timing))
}

/// Logs wall-clock duration per procedure. With `dev_delay` set, sleeps a
/// random 100-500ms first so loading states show up during development.
async fn timing(State(config): State<Arc<Config>>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let start = Instant::now();

    if config.dev_delay {
        let wait_ms = rand::rng().random_range(100..=500);
        tokio::time::sleep(Duration::from_millis(wait_ms)).await;
    }

    let response = next.run(request).await;

    info!(%path, elapsed_ms = start.elapsed().as_millis() as u64, "rpc call");
    response
}
