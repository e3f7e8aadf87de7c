use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;

use crate::{
    AppError, AppResult, AppState,
    identity::{AuthorView, IdentityProvider},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/profile.getUserByUsername", get(get_user_by_username))
}

#[derive(Deserialize)]
pub(crate) struct UsernameQuery {
    pub(crate) username: String,
}

async fn get_user_by_username(
    State(identity): State<Arc<dyn IdentityProvider>>,
    Query(UsernameQuery { username }): Query<UsernameQuery>,
) -> AppResult<Json<AuthorView>> {
    match identity.get_by_username(&username).await? {
        Some(author) => Ok(Json(author)),
        None => Err(AppError::NotFound("user")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::testing::{StaticProvider, author};

    #[tokio::test]
    async fn known_username_resolves_to_its_author_view() {
        let identity: Arc<dyn IdentityProvider> = Arc::new(StaticProvider {
            users: vec![author("user_1", Some("crab")), author("user_2", Some("gull"))],
        });

        let Json(view) = get_user_by_username(
            State(identity),
            Query(UsernameQuery {
                username: "gull".to_owned(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(view.id, "user_2");
        assert_eq!(view.username.as_deref(), Some("gull"));
    }

    #[tokio::test]
    async fn unknown_username_is_not_found() {
        let identity: Arc<dyn IdentityProvider> = Arc::new(StaticProvider { users: vec![] });

        let result = get_user_by_username(
            State(identity),
            Query(UsernameQuery {
                username: "nobody".to_owned(),
            }),
        )
        .await;

        assert!(matches!(result, Err(AppError::NotFound("user"))));
    }
}
