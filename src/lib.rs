pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod identity;
pub mod index;
pub mod limiter;
pub mod posts;
pub mod profiles;
pub mod res;
pub mod session;

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

pub use cache::RenderCache;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use identity::IdentityProvider;
pub use limiter::RateLimiter;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub identity: Arc<dyn IdentityProvider>,
    pub limiter: Arc<dyn RateLimiter>,
    pub clients: auth::Clients,
    pub cache: RenderCache,
    pub config: Arc<Config>,
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> AppResult<String>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> AppResult<String> {
        Ok(
            self.get(field)
            .ok_or(format!("expected {field} in {self}"))?
            .as_str()
            .ok_or(format!("expected {field} in {self} to be string"))?
            .to_owned()
        )
    }
}
