use std::sync::Arc;

use serde::Serialize;
use socketioxide::extract::{Data, SocketRef};
use uuid::Uuid;

use heartline_shared::errors::{AppError, ErrorCode};

use crate::domain::conversation;
use crate::domain::graph::PairState;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorPayload {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code().code().to_string(),
            message: err.to_string(),
        }
    }
}

fn get_user_id(socket: &SocketRef) -> Option<Uuid> {
    socket.extensions.get::<Uuid>()
}

fn emit_error(socket: &SocketRef, err: &AppError) {
    socket.emit("error", &ErrorPayload::from(err)).ok();
}

pub async fn on_connect(socket: SocketRef, state: Arc<AppState>) {
    let user_id = match authenticate_socket(&socket, &state).await {
        Ok(id) => id,
        Err(err) => {
            tracing::warn!(error = %err, sid = %socket.id, "socket auth failed");
            emit_error(&socket, &err);
            socket.disconnect().ok();
            return;
        }
    };

    socket.extensions.insert(user_id);
    tracing::info!(user_id = %user_id, sid = %socket.id, "socket connected");
    socket.emit("connected", &serde_json::json!({ "user_id": user_id })).ok();

    socket.on("joinRoom", {
        let state = state.clone();
        move |socket: SocketRef, Data::<String>(room)| {
            let state = state.clone();
            async move { on_join_room(socket, room, &state).await }
        }
    });

    socket.on("leaveRoom", |socket: SocketRef, Data::<String>(room)| async move {
        socket.leave(room.clone()).ok();
        tracing::debug!(room_id = %room, sid = %socket.id, "left room");
    });

    socket.on_disconnect(|socket: SocketRef| async move {
        socket.leave_all().ok();
        tracing::info!(user_id = ?get_user_id(&socket), sid = %socket.id, "socket disconnected");
    });
}

async fn on_join_room(socket: SocketRef, room: String, state: &AppState) {
    let Some(user_id) = get_user_id(&socket) else {
        return;
    };

    let result = async {
        let key = conversation::authorize_room(user_id, &room)?;
        if state.store.pair_state(key).await? != PairState::Matched {
            return Err(AppError::new(ErrorCode::NotMatched, "you can only join rooms of your matches"));
        }
        Ok::<(), AppError>(())
    }
    .await;

    match result {
        Ok(()) => {
            socket.join(room.clone()).ok();
            tracing::debug!(user_id = %user_id, room_id = %room, "joined room");
        }
        Err(err) => {
            tracing::debug!(user_id = %user_id, room_id = %room, error = %err, "join refused");
            emit_error(&socket, &err);
        }
    }
}

async fn authenticate_socket(socket: &SocketRef, state: &AppState) -> Result<Uuid, AppError> {
    let token = {
        let parts = socket.req_parts();
        token_from_query(parts.uri.query().unwrap_or_default())
    }
    .ok_or_else(|| AppError::unauthorized("missing token query parameter"))?;

    let claims = state.verifier.verify(&token)?;
    let user = state
        .store
        .user_by_subject(&claims.sub)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))?;

    Ok(user.id)
}

fn token_from_query(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "token" && !value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_read_from_query() {
        assert_eq!(token_from_query("EIO=4&transport=websocket&token=abc.def.ghi").as_deref(), Some("abc.def.ghi"));
        assert_eq!(token_from_query("EIO=4&transport=polling"), None);
        assert_eq!(token_from_query("token="), None);
    }
}
