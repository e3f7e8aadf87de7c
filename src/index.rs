use std::sync::Arc;

use axum::{
    debug_handler,
    extract::State,
    response::{Html, IntoResponse, Response},
};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{
    AppResult, RenderCache, include_res,
    identity::IdentityProvider,
    posts::{rpc::with_authors, store, view},
    session::USER_ID,
};

/// `/` — the global feed with the composer on top. The feed fragment is
/// cached; the composer-or-sign-in chrome depends on the session and is
/// composed per request.
#[debug_handler(state = crate::AppState)]
pub async fn index(
    State(db_pool): State<SqlitePool>,
    State(identity): State<Arc<dyn IdentityProvider>>,
    State(cache): State<RenderCache>,
    session: Session,
) -> AppResult<Response> {
    let signed_in = session.get::<String>(USER_ID).await?.is_some();

    let render = move || async move {
        let posts = store::recent(&db_pool).await?;
        let entries = with_authors(identity.as_ref(), posts).await?;
        Ok(view::feed_html(&entries))
    };

    let feed = match cache.get_or_render("/", render).await {
        Ok(html) => html,
        Err(err) => {
            tracing::error!(error = %err, "feed render failed");
            "<div class=\"error\">Something went wrong</div>".to_owned()
        }
    };

    let top = if signed_in {
        include_res!(str, "/pages/composer.html")
    } else {
        include_res!(str, "/pages/signin.html")
    };

    Ok(Html(
        include_res!(str, "/pages/index.html")
            .replace("{composer}", top)
            .replace("{feed}", &feed),
    )
    .into_response())
}
