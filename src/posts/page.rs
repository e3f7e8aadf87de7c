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

#[debug_handler(state = crate::AppState)]
pub async fn post_page(
    Path(id): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(identity): State<Arc<dyn IdentityProvider>>,
    State(cache): State<RenderCache>,
) -> AppResult<Response> {
    let key = format!("/post/{id}");
    let render = move || async move {
        let Some(post) = store::by_id(&db_pool, &id).await? else {
            return Err(AppError::NotFound("post"));
        };

        let mut joined = with_authors(identity.as_ref(), vec![post]).await?;
        let entry = joined.pop().ok_or("joined post vanished")?;

        let username = entry.author.username.clone().unwrap_or_default();
        Ok(include_res!(str, "/pages/post.html")
            .replace("{title}", &format!("{} - @{username}", entry.post.content))
            .replace("{post}", &view::post_html(&entry)))
    };

    match cache.get_or_render(&key, render).await {
        Ok(body) => Ok(Html(body).into_response()),
        Err(AppError::NotFound(what)) => res::sorry(what),
        Err(err) => Err(err),
    }
}
