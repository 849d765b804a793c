use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::server::state::ServerState;

/// Live summary of the registry. Chat history stays private to the room.
pub(crate) async fn info(State(state): State<ServerState>) -> impl IntoResponse {
  let rooms: Vec<_> = state
    .rooms
    .rooms()
    .iter()
    .map(|room| {
      let room = room.read_arc();
      json!({
        "id": room.id,
        "members": room.members.len(),
        "videoId": room.playback.video_id,
        "playing": room.playback.playing,
      })
    })
    .collect();

  Json(json!({ "connections": state.rooms.connection_count(), "rooms": rooms }))
}
