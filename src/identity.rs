//! Adapter over the hosted identity service.
//!
//! User records live entirely in the external provider; this module projects
//! them into the client-safe [`AuthorView`] shape and gates authenticated
//! procedures on the session's user id.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{AppError, AppResult, Config, session::USER_ID};

/// Client-safe projection of a provider user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorView {
    pub id: String,
    pub username: Option<String>,
    pub profile_image_url: String,
}

/// Raw user record as the provider returns it.
#[derive(Debug, Deserialize)]
pub struct ProviderUser {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    pub image_url: String,
}

pub fn filter_for_client(user: ProviderUser) -> AuthorView {
    AuthorView {
        id: user.id,
        username: user.username,
        profile_image_url: user.image_url,
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Batched lookup by user ids. The provider caps a batch at 100 records,
    /// which matches the feed page size.
    async fn list_by_ids(&self, ids: &[String]) -> AppResult<Vec<AuthorView>>;

    async fn get_by_username(&self, username: &str) -> AppResult<Option<AuthorView>>;
}

pub struct HttpIdentityProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpIdentityProvider {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.identity_url.clone(),
            api_key: config.identity_api_key.clone(),
        }
    }

    async fn list_users(&self, query: &[(&str, &str)]) -> AppResult<Vec<ProviderUser>> {
        Ok(self
            .http
            .get(format!("{}/users", self.base_url))
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn list_by_ids(&self, ids: &[String]) -> AppResult<Vec<AuthorView>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: Vec<(&str, &str)> = ids.iter().map(|id| ("user_id", id.as_str())).collect();
        query.push(("limit", "100"));

        let users = self.list_users(&query).await?;
        Ok(users.into_iter().map(filter_for_client).collect())
    }

    async fn get_by_username(&self, username: &str) -> AppResult<Option<AuthorView>> {
        let users = self.list_users(&[("username", username)]).await?;
        Ok(users.into_iter().next().map(filter_for_client))
    }
}

/// Extractor for the authenticated caller's user id.
///
/// Fails with UNAUTHORIZED before the handler body runs when the session
/// carries no user id.
pub struct Caller(pub String);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, err)| AppError::from(err))?;

        match session.get::<String>(USER_ID).await? {
            Some(user_id) => Ok(Caller(user_id)),
            None => Err(AppError::Unauthorized),
        }
    }
}
