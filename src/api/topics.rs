//! Topic management endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::auth::AuthUser;
use crate::domain::{Routing, Topic};
use crate::error::Result;
use crate::server::AppState;
use crate::service::{TopicChanges, TopicInput};

/// POST /api/topics
#[tracing::instrument(name = "http.create_topic", skip(state, input))]
pub async fn create_topic(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<TopicInput>,
) -> Result<(StatusCode, Json<Topic>)> {
    let topic = state.topics.create(user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(topic)))
}

/// GET /api/topics
#[tracing::instrument(name = "http.list_topics", skip(state))]
pub async fn list_topics(State(state): State<AppState>, user: AuthUser) -> Result<Json<Vec<Topic>>> {
    Ok(Json(state.topics.list(user.user_id).await?))
}

/// GET /api/topics/{id}
#[tracing::instrument(name = "http.get_topic", skip(state))]
pub async fn get_topic(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Topic>> {
    Ok(Json(state.topics.get(user.user_id, id).await?))
}

/// PUT /api/topics/{id}
#[tracing::instrument(name = "http.update_topic", skip(state, changes))]
pub async fn update_topic(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(changes): Json<TopicChanges>,
) -> Result<Json<Topic>> {
    Ok(Json(state.topics.update(user.user_id, id, changes).await?))
}

/// DELETE /api/topics/{id}
#[tracing::instrument(name = "http.delete_topic", skip(state))]
pub async fn delete_topic(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.topics.delete(user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/topics/{id}/regenerate-key
#[tracing::instrument(name = "http.regenerate_key", skip(state))]
pub async fn regenerate_key(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Topic>> {
    Ok(Json(state.topics.regenerate_key(user.user_id, id).await?))
}

/// GET /api/topics/{id}/routings
#[tracing::instrument(name = "http.topic_routings", skip(state))]
pub async fn topic_routings(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Routing>>> {
    Ok(Json(state.routings.list_by_topic(user.user_id, id).await?))
}
