//! The post procedures. Read procedures are public; `posts.create` requires
//! a caller identity and a slot in the rate-limit window.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use unicode_segmentation::UnicodeSegmentation;

use crate::{
    AppError, AppResult, AppState,
    identity::{AuthorView, Caller, IdentityProvider},
    limiter::RateLimiter,
    posts::store::{self, Post},
};

/// The only shape list/get reads ever return: a post is never served without
/// its resolved author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostWithAuthor {
    pub post: Post,
    pub author: AuthorView,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts.getAll", get(get_all))
        .route("/posts.getPostsByUserId", get(get_posts_by_user_id))
        .route("/posts.getById", get(get_by_id))
        .route("/posts.create", post(create))
        .route("/posts.getLatest", get(get_latest))
}

/// Pairs every post with its author in one batched identity lookup.
///
/// All-or-nothing: a post whose author is missing, or whose author has no
/// username, fails the whole call rather than being dropped from the result.
pub async fn with_authors(
    identity: &dyn IdentityProvider,
    posts: Vec<Post>,
) -> AppResult<Vec<PostWithAuthor>> {
    let mut ids: Vec<String> = posts.iter().map(|post| post.author_id.clone()).collect();
    ids.sort_unstable();
    ids.dedup();

    let authors = identity.list_by_ids(&ids).await?;

    posts
        .into_iter()
        .map(|post| {
            let author = authors
                .iter()
                .find(|author| author.id == post.author_id)
                .filter(|author| author.username.is_some())
                .cloned()
                .ok_or_else(|| {
                    AppError::Internal(anyhow::Error::msg(format!(
                        "author for post {} not found",
                        post.id
                    )))
                })?;

            Ok(PostWithAuthor { post, author })
        })
        .collect()
}

pub(crate) fn validate_content(content: &str) -> AppResult<()> {
    let invalid = |message: &str| AppError::Validation {
        field: "content",
        message: message.to_owned(),
    };

    if content.is_empty() {
        return Err(invalid("Content must not be empty"));
    }
    if !content.graphemes(true).all(|g| emojis::get(g).is_some()) {
        return Err(invalid("Only emojis are allowed"));
    }
    if content.chars().count() > 280 {
        return Err(invalid("Content must be at most 280 characters"));
    }

    Ok(())
}

async fn get_all(
    State(db_pool): State<SqlitePool>,
    State(identity): State<Arc<dyn IdentityProvider>>,
) -> AppResult<Json<Vec<PostWithAuthor>>> {
    let posts = store::recent(&db_pool).await?;
    Ok(Json(with_authors(identity.as_ref(), posts).await?))
}

#[derive(Deserialize)]
pub(crate) struct UserIdQuery {
    #[serde(rename = "userId")]
    pub(crate) user_id: String,
}

async fn get_posts_by_user_id(
    State(db_pool): State<SqlitePool>,
    State(identity): State<Arc<dyn IdentityProvider>>,
    Query(UserIdQuery { user_id }): Query<UserIdQuery>,
) -> AppResult<Json<Vec<PostWithAuthor>>> {
    let posts = store::by_author(&db_pool, &user_id).await?;
    Ok(Json(with_authors(identity.as_ref(), posts).await?))
}

#[derive(Deserialize)]
pub(crate) struct IdQuery {
    pub(crate) id: String,
}

async fn get_by_id(
    State(db_pool): State<SqlitePool>,
    State(identity): State<Arc<dyn IdentityProvider>>,
    Query(IdQuery { id }): Query<IdQuery>,
) -> AppResult<Json<PostWithAuthor>> {
    let Some(post) = store::by_id(&db_pool, &id).await? else {
        return Err(AppError::NotFound("post"));
    };

    let mut joined = with_authors(identity.as_ref(), vec![post]).await?;
    let entry = joined.pop().ok_or("joined post vanished")?;
    Ok(Json(entry))
}

#[derive(Deserialize)]
pub(crate) struct CreateInput {
    pub(crate) content: String,
}

async fn create(
    State(db_pool): State<SqlitePool>,
    State(limiter): State<Arc<dyn RateLimiter>>,
    Caller(author_id): Caller,
    Json(input): Json<CreateInput>,
) -> AppResult<Json<Post>> {
    validate_content(&input.content)?;

    if !limiter.allow(&author_id).await? {
        return Err(AppError::RateLimited);
    }

    let post = store::insert(&db_pool, &author_id, &input.content).await?;
    Ok(Json(post))
}

async fn get_latest(State(db_pool): State<SqlitePool>) -> AppResult<Json<Option<Post>>> {
    Ok(Json(store::latest(&db_pool).await?))
}
