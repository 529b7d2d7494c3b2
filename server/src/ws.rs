use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use marble_shared::protocol::RoomStateMsg;
use serde::Deserialize;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use crate::chat::ChatChannel;
use crate::client::serve_socket;
use crate::config::{ServerConfig, SessionSettings};
use crate::cursor::CursorChannel;
use crate::game::Game;
use crate::hub::{spawn_hub, HubHandle};
use crate::room::{RoomError, Rooms};
use crate::session::{run_game_session, GameChannel, GameCommand};

/// Shared app state passed to each handler
#[derive(Clone)]
pub struct AppState {
    pub game_hub: HubHandle,
    pub chat_hub: HubHandle,
    pub cursor_hub: HubHandle,
    pub rooms: Rooms,
    pub session: SessionSettings,
}

impl AppState {
    /// Spawn the game session and every global hub. Needs a tokio runtime.
    pub fn new(config: &ServerConfig) -> Self {
        let session = config.session.clone();
        let hook_delay = session.departure_hook_delay;

        let (game_tx, game_rx) = mpsc::channel::<GameCommand>(256);
        let game_hub = spawn_hub(
            Arc::new(GameChannel::new(game_tx, config.join_delay)),
            hook_delay,
        );
        let game = Game::new(config.game, config.max_settle_steps, config.rng_seed);
        tokio::spawn(run_game_session(game_rx, game_hub.clone(), game));

        Self {
            game_hub,
            chat_hub: spawn_hub(Arc::new(ChatChannel), hook_delay),
            cursor_hub: spawn_hub(Arc::new(CursorChannel::new(config.cursor_debounce)), hook_delay),
            rooms: Rooms::new(config.room_max_players, session.clone()),
            session,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws/game", get(game_ws))
        .route("/ws/chat", get(chat_ws))
        .route("/ws/cursor", get(cursor_ws))
        .route("/ws/room/{id}", get(room_ws))
        .route("/rooms", get(list_rooms))
        .route("/rooms/{id}/join", post(join_room))
        .route("/rooms/{id}/leave", post(leave_room))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(rename = "userToken", default)]
    pub user_token: String,
}

fn missing_token() -> Response {
    (StatusCode::BAD_REQUEST, "no userToken").into_response()
}

fn upgrade(ws: WebSocketUpgrade, user_token: String, hub: HubHandle, session: SessionSettings) -> Response {
    ws.max_message_size(session.max_message_size)
        .on_upgrade(move |socket| serve_socket(socket, user_token, hub, session))
}

async fn game_ws(ws: WebSocketUpgrade, Query(q): Query<TokenQuery>, State(state): State<AppState>) -> Response {
    if q.user_token.is_empty() {
        return missing_token();
    }
    upgrade(ws, q.user_token, state.game_hub, state.session)
}

async fn chat_ws(ws: WebSocketUpgrade, Query(q): Query<TokenQuery>, State(state): State<AppState>) -> Response {
    if q.user_token.is_empty() {
        return missing_token();
    }
    upgrade(ws, q.user_token, state.chat_hub, state.session)
}

async fn cursor_ws(ws: WebSocketUpgrade, Query(q): Query<TokenQuery>, State(state): State<AppState>) -> Response {
    if q.user_token.is_empty() {
        return missing_token();
    }
    upgrade(ws, q.user_token, state.cursor_hub, state.session)
}

async fn room_ws(
    ws: WebSocketUpgrade,
    Path(id): Path<u32>,
    Query(q): Query<TokenQuery>,
    State(state): State<AppState>,
) -> Response {
    if q.user_token.is_empty() {
        return missing_token();
    }
    if !state.rooms.is_member(id, &q.user_token) {
        return (StatusCode::FORBIDDEN, "You're not allowed in this room").into_response();
    }
    let Some(hub) = state.rooms.hub(id) else {
        return (StatusCode::NOT_FOUND, "no such room").into_response();
    };
    upgrade(ws, q.user_token, hub, state.session)
}

async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomStateMsg>> {
    Json(state.rooms.list())
}

impl IntoResponse for RoomError {
    fn into_response(self) -> Response {
        let status = match self {
            RoomError::Full | RoomError::NotInRoom => StatusCode::CONFLICT,
            RoomError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, self.to_string()).into_response()
    }
}

async fn join_room(
    Path(id): Path<u32>,
    Query(q): Query<TokenQuery>,
    State(state): State<AppState>,
) -> Result<Json<RoomStateMsg>, Response> {
    if q.user_token.is_empty() {
        return Err(missing_token());
    }
    state
        .rooms
        .join(id, &q.user_token)
        .map(Json)
        .map_err(IntoResponse::into_response)
}

async fn leave_room(
    Path(id): Path<u32>,
    Query(q): Query<TokenQuery>,
    State(state): State<AppState>,
) -> Result<Json<RoomStateMsg>, Response> {
    if q.user_token.is_empty() {
        return Err(missing_token());
    }
    state
        .rooms
        .leave(id, &q.user_token)
        .map(Json)
        .map_err(IntoResponse::into_response)
}
