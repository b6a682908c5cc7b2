use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    error::ApiError,
    response::Envelope,
    state::AppState,
    users::{
        dto::{PageQuery, SignUpRequest},
        repo_types::{User, UserDetails},
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user)
                .put(update_user)
                .patch(update_user)
                .delete(delete_user),
        )
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<Envelope<UserDetails>, ApiError> {
    let Json(payload) = payload.map_err(|e| {
        warn!(error = %e, "invalid signup body");
        ApiError::invalid("Invalid request")
    })?;

    let user = services::create_user(state.users.as_ref(), payload).await?;
    Ok(Envelope::created("User created successfully", user))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Envelope<()>, ApiError> {
    let id = services::parse_user_id(&id)?;
    services::delete_user(state.users.as_ref(), id).await?;
    Ok(Envelope::empty(StatusCode::OK, "User deleted successfully"))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Envelope<UserDetails>, ApiError> {
    let id = services::parse_user_id(&id)?;
    let user = services::fetch_user(state.users.as_ref(), id).await?;
    Ok(Envelope::ok("User fetched successfully", user))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Envelope<Vec<UserDetails>>, ApiError> {
    let page = PageQuery::from_pairs(pairs).resolve();
    let (users, meta) = services::fetch_users(state.users.as_ref(), page).await?;
    Ok(Envelope::ok("Users fetched successfully", users).with_page(meta))
}

#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Envelope<User>, ApiError> {
    let id = services::parse_user_id(&id)?;
    let user = services::update_user(state.users.as_ref(), id, &body).await?;
    Ok(Envelope::ok("User updated successfully", user))
}
