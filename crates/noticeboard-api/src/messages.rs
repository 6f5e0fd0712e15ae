use axum::{
    Extension, Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use noticeboard_db::models::{MessageRow, MutationOutcome};
use noticeboard_types::api::{
    MessageIdQuery, MessageResponse, SaveMessageRequest, StatusMessage, UpdateMessageRequest,
    UpdatedMessageResponse,
};

use crate::error::{ApiError, ApiResult};
use crate::session::SessionUser;
use crate::state::{AppState, blocking};

/// All messages from every user, newest first. No paging.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(_user): Extension<SessionUser>,
) -> ApiResult<Json<Vec<MessageResponse>>> {
    let rows = blocking(&state, |state| Ok(state.db.list_messages()?)).await?;

    let messages = rows.into_iter().map(to_response).collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(messages))
}

/// Posts a message as the session user. Empty text is allowed.
pub async fn save_message(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    payload: Result<Json<SaveMessageRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(req) = payload?;

    let user_id = user.user_id;
    let row = blocking(&state, move |state| {
        Ok(state.db.insert_message(user_id, &req.text)?)
    })
    .await?;

    info!("User '{}' posted message {}", user.username, row.id);
    Ok(Json(to_response(row)?))
}

pub async fn update_message(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    query: Result<Query<MessageIdQuery>, QueryRejection>,
    payload: Result<Json<UpdateMessageRequest>, JsonRejection>,
) -> ApiResult<Json<UpdatedMessageResponse>> {
    let id = require_id(query?)?;
    let Json(req) = payload?;

    let user_id = user.user_id;
    let outcome = blocking(&state, move |state| {
        Ok(state.db.update_message_text(id, user_id, &req.text)?)
    })
    .await?;

    let row = owned(outcome, &user, id)?;
    info!("User '{}' edited message {}", user.username, id);

    let timestamp = parse_timestamp(&row)?;
    Ok(Json(UpdatedMessageResponse {
        id: row.id,
        text: row.text,
        timestamp,
    }))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    query: Result<Query<MessageIdQuery>, QueryRejection>,
) -> ApiResult<Json<StatusMessage>> {
    let id = require_id(query?)?;

    let user_id = user.user_id;
    let outcome = blocking(&state, move |state| Ok(state.db.delete_message(id, user_id)?)).await?;

    owned(outcome, &user, id)?;
    info!("User '{}' deleted message {}", user.username, id);

    Ok(Json(StatusMessage::new("message deleted")))
}

fn require_id(Query(query): Query<MessageIdQuery>) -> ApiResult<i64> {
    query
        .id
        .ok_or_else(|| ApiError::Validation("message id is required".into()))
}

fn owned<T>(outcome: MutationOutcome<T>, user: &SessionUser, id: i64) -> ApiResult<T> {
    match outcome {
        MutationOutcome::Applied(value) => Ok(value),
        MutationOutcome::NotFound => Err(ApiError::NotFound),
        MutationOutcome::Forbidden => {
            warn!("User '{}' tried to modify message {} owned by someone else", user.username, id);
            Err(ApiError::Forbidden)
        }
    }
}

fn to_response(row: MessageRow) -> ApiResult<MessageResponse> {
    let timestamp = parse_timestamp(&row)?;
    Ok(MessageResponse {
        id: row.id,
        text: row.text,
        timestamp,
        user_id: row.user_id,
        username: row.username,
    })
}

/// A stored timestamp that cannot be read is a storage fault, not a date.
fn parse_timestamp(row: &MessageRow) -> ApiResult<DateTime<Utc>> {
    row.timestamp
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') format has no timezone; it is UTC.
            chrono::NaiveDateTime::parse_from_str(&row.timestamp, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("corrupt timestamp '{}' on message {}", row.timestamp, row.id))
        .map_err(ApiError::from)
}
