use axum::{extract::State, routing::post, Json, Router};
use tracing::instrument;

use crate::{
    auth::{dto::CredentialsRequest, repo_types::User, services},
    error::AppResult,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> AppResult<Json<User>> {
    let user = services::register(state.users.as_ref(), &payload.username, &payload.password).await?;
    Ok(Json(user))
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> AppResult<Json<User>> {
    let user = services::login(state.users.as_ref(), &payload.username, &payload.password).await?;
    Ok(Json(user))
}
