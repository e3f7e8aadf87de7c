use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeVerifier, TokenResponse};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::info;

use crate::{
    AppResult, Config, GetField,
    session::{CSRF_STATE, PKCE_VERIFIER, RETURN_URL, USER_ID},
};

use super::{Clients, clients::ClientProvider};

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

/// Body of the identity service's IdP sign-in endpoint: it swaps a
/// provider access token for the service's own opaque user id.
#[derive(Serialize)]
struct IdpSignInRequest {
    access_token: String,
    provider_id: String,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn callback(
    Path(provider): Path<ClientProvider>,
    Query(CallbackQuery { state, code }): Query<CallbackQuery>,
    State(clients): State<Clients>,
    State(config): State<Arc<Config>>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let state = CsrfToken::new(state.ok_or("OAuth: without state")?);
    let code = AuthorizationCode::new(code.ok_or("OAuth: without code")?);

    let Some(stored_state) = session.get::<String>(CSRF_STATE).await? else {
        return Err("no csrf_state")?;
    };

    if state.secret().as_str() != stored_state.as_str() {
        return Err("csrf tokens don't match")?;
    }

    let Some(pkce_verifier) = session.get::<String>(PKCE_VERIFIER).await? else {
        return Err("no pkce_verifier")?;
    };

    let client = clients.get_client(provider)?;
    let http_client = reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    let token_result = client
        .exchange_code(code)
        .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
        .request_async(&http_client)
        .await?;

    let access_token = token_result.access_token().secret();
    let body: serde_json::Value = http_client
        .post(format!("{}/idp/sign_in", config.identity_url))
        .bearer_auth(&config.identity_api_key)
        .json(&IdpSignInRequest {
            access_token: access_token.clone(),
            provider_id: provider.id().to_owned(),
        })
        .send()
        .await?
        .json()
        .await?;

    let user_id = body.get_str_field("userId")?;
    session.insert(USER_ID, user_id.clone()).await?;

    let return_url: Option<String> = session.get(RETURN_URL).await?;

    info!(%user_id, %provider, "signed in");

    let return_url = return_url.unwrap_or("/".to_string());
    Ok(Redirect::to(return_url.as_str()))
}
