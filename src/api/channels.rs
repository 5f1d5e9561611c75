//! Channel management endpoints.
//!
//! Credentials are only echoed back by the single-channel GET.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::domain::{Channel, Routing};
use crate::error::Result;
use crate::server::AppState;
use crate::service::ChannelInput;

/// A channel without its credentials
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSummary {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Channel> for ChannelSummary {
    fn from(channel: Channel) -> Self {
        Self {
            id: channel.id,
            user_id: channel.user_id,
            name: channel.name,
            channel_type: channel.channel_type,
            created_at: channel.created_at,
            updated_at: channel.updated_at,
        }
    }
}

/// POST /api/channels
#[tracing::instrument(name = "http.create_channel", skip(state, input))]
pub async fn create_channel(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<ChannelInput>,
) -> Result<(StatusCode, Json<ChannelSummary>)> {
    let channel = state.channels.create(user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(channel.into())))
}

/// GET /api/channels
#[tracing::instrument(name = "http.list_channels", skip(state))]
pub async fn list_channels(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<ChannelSummary>>> {
    let channels = state.channels.list(user.user_id).await?;
    Ok(Json(channels.into_iter().map(ChannelSummary::from).collect()))
}

/// GET /api/channels/{id}
#[tracing::instrument(name = "http.get_channel", skip(state))]
pub async fn get_channel(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Channel>> {
    Ok(Json(state.channels.get(user.user_id, id).await?))
}

/// PUT /api/channels/{id}
#[tracing::instrument(name = "http.update_channel", skip(state, input))]
pub async fn update_channel(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(input): Json<ChannelInput>,
) -> Result<Json<ChannelSummary>> {
    let channel = state.channels.update(user.user_id, id, input).await?;
    Ok(Json(channel.into()))
}

/// DELETE /api/channels/{id}
#[tracing::instrument(name = "http.delete_channel", skip(state))]
pub async fn delete_channel(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.channels.delete(user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/channels/{id}/routings
#[tracing::instrument(name = "http.channel_routings", skip(state))]
pub async fn channel_routings(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Routing>>> {
    Ok(Json(state.routings.list_by_channel(user.user_id, id).await?))
}
