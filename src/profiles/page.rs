use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Path, State},
    response::{Html, IntoResponse, Response},
};
use sqlx::SqlitePool;

use crate::{
    AppError, AppResult, RenderCache, include_res,
    identity::IdentityProvider,
    posts::{rpc::with_authors, store, view},
    res,
};

/// `/@username` — profile header plus that author's posts. Any other
/// top-level slug is a plain 404.
#[debug_handler(state = crate::AppState)]
pub async fn profile_page(
    Path(slug): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(identity): State<Arc<dyn IdentityProvider>>,
    State(cache): State<RenderCache>,
) -> AppResult<Response> {
    let Some(username) = slug.strip_prefix('@').map(str::to_owned) else {
        return res::sorry("page");
    };

    let key = format!("/@{username}");
    let render = move || async move {
        let Some(author) = identity.get_by_username(&username).await? else {
            return Err(AppError::NotFound("user"));
        };

        let posts = store::by_author(&db_pool, &author.id).await?;
        let feed = if posts.is_empty() {
            "<div class=\"empty\">User has not posted</div>".to_owned()
        } else {
            view::feed_html(&with_authors(identity.as_ref(), posts).await?)
        };

        Ok(include_res!(str, "/pages/profile.html")
            .replace("{username}", &username)
            .replace("{avatar}", &author.profile_image_url)
            .replace("{posts}", &feed))
    };

    match cache.get_or_render(&key, render).await {
        Ok(body) => Ok(Html(body).into_response()),
        Err(AppError::NotFound(what)) => res::sorry(what),
        Err(err) => Err(err),
    }
}
