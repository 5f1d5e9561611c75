//! Message history endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::server::AppState;
use crate::service::{MessageDetail, MessagePage};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// GET /api/topics/{id}/messages?page=1&pageSize=20
#[tracing::instrument(name = "http.topic_messages", skip(state))]
pub async fn topic_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<MessagePage>> {
    let page = state
        .messages
        .list_by_topic(user.user_id, id, query.page, query.page_size)
        .await?;
    Ok(Json(page))
}

/// GET /api/messages/{id}
#[tracing::instrument(name = "http.get_message", skip(state))]
pub async fn get_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageDetail>> {
    Ok(Json(state.messages.get(user.user_id, id).await?))
}
