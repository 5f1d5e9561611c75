//! Routing management endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::auth::AuthUser;
use crate::domain::Routing;
use crate::error::Result;
use crate::server::AppState;
use crate::service::{RoutingChanges, RoutingInput};

/// POST /api/routings
#[tracing::instrument(name = "http.create_routing", skip(state, input))]
pub async fn create_routing(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<RoutingInput>,
) -> Result<(StatusCode, Json<Routing>)> {
    let routing = state.routings.create(user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(routing)))
}

/// PUT /api/routings/{topic_id}/{channel_id}
#[tracing::instrument(name = "http.update_routing", skip(state, changes))]
pub async fn update_routing(
    State(state): State<AppState>,
    user: AuthUser,
    Path((topic_id, channel_id)): Path<(i64, i64)>,
    Json(changes): Json<RoutingChanges>,
) -> Result<Json<Routing>> {
    let routing = state
        .routings
        .update(user.user_id, topic_id, channel_id, changes)
        .await?;
    Ok(Json(routing))
}

/// DELETE /api/routings/{topic_id}/{channel_id}
#[tracing::instrument(name = "http.delete_routing", skip(state))]
pub async fn delete_routing(
    State(state): State<AppState>,
    user: AuthUser,
    Path((topic_id, channel_id)): Path<(i64, i64)>,
) -> Result<StatusCode> {
    state
        .routings
        .delete(user.user_id, topic_id, channel_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
