use axum::{Router, routing::get};

use crate::AppState;

mod callback;
mod clients;
mod login;
mod logout;

pub use clients::{ClientProvider, Clients};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login::login_page))
        .route("/login/{provider}", get(login::login))
        .route("/callback/{provider}", get(callback::callback))
        .route("/logout", get(logout::logout))
}
