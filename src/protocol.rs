use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::rooms::{ChatMessage, ConnId, PlaybackSnapshot, RoomId};

/// Events a client sends to the server. Tags and field names follow the
/// original wire protocol (`create-room`, `currentTime`, ...).
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
  CreateRoom,
  JoinRoom { room_id: RoomId },
  VideoChange { video_id: String },
  Play { current_time: f64 },
  Pause { current_time: f64 },
  Seek { current_time: f64 },
  ChatMessage { text: String },
  Ping,
}

/// Events the server sends back: replies to create/join, room fan-out, and
/// membership notifications.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
  RoomCreated {
    room_id: RoomId,
    is_host: bool,
  },
  RoomJoined {
    success: bool,
    is_host: bool,
    video_id: String,
    video_state: PlaybackSnapshot,
    messages: Vec<ChatMessage>,
  },
  JoinFailed {
    success: bool,
    error: String,
  },
  VideoChange {
    video_id: String,
  },
  Play {
    current_time: f64,
  },
  Pause {
    current_time: f64,
  },
  Seek {
    current_time: f64,
  },
  ChatMessage(ChatMessage),
  UserJoined {
    user_id: ConnId,
  },
  UserLeft {
    user_id: ConnId,
  },
  Pong,
}

impl fmt::Display for ClientEvent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&serde_json::to_string(self).map_err(|_| fmt::Error)?)
  }
}

impl FromStr for ClientEvent {
  type Err = serde_json::Error;

  fn from_str(s: &str) -> serde_json::Result<Self> {
    serde_json::from_str(s)
  }
}

impl fmt::Display for ServerEvent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&serde_json::to_string(self).map_err(|_| fmt::Error)?)
  }
}

impl FromStr for ServerEvent {
  type Err = serde_json::Error;

  fn from_str(s: &str) -> serde_json::Result<Self> {
    serde_json::from_str(s)
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn client_events_use_kebab_case_tags() {
    assert_eq!(serde_json::to_value(ClientEvent::CreateRoom).unwrap(), json!({ "type": "create-room" }));
    assert_eq!(
      serde_json::to_value(ClientEvent::Play { current_time: 1.5 }).unwrap(),
      json!({ "type": "play", "currentTime": 1.5 })
    );
    assert_eq!(
      serde_json::to_value(ClientEvent::VideoChange { video_id: "xyz".into() }).unwrap(),
      json!({ "type": "video-change", "videoId": "xyz" })
    );
  }

  #[test]
  fn join_reply_carries_camel_case_snapshot() {
    let event = ServerEvent::RoomJoined {
      success: true,
      is_host: false,
      video_id: "xyz".into(),
      video_state: PlaybackSnapshot { playing: false, current_time: 42.0 },
      messages: vec![],
    };
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["type"], "room-joined");
    assert_eq!(value["success"], true);
    assert_eq!(value["isHost"], false);
    assert_eq!(value["videoId"], "xyz");
    assert_eq!(value["videoState"], json!({ "playing": false, "currentTime": 42.0 }));
    assert_eq!(value["messages"], json!([]));
  }

  #[test]
  fn chat_broadcast_names_its_author_user_id() {
    let payload = r#"{"type":"chat-message","id":1,"text":"hi","userId":"01h455vb4pex5vsknk084sn02q","timestamp":"2026-08-07T12:00:00Z"}"#;
    let event: ServerEvent = payload.parse().unwrap();
    match event {
      ServerEvent::ChatMessage(message) => {
        assert_eq!(message.id, 1);
        assert_eq!(message.text, "hi");
      }
      other => panic!("unexpected event: {other:?}"),
    }
  }

  #[test]
  fn display_round_trips_through_from_str() {
    let event = ClientEvent::Seek { current_time: 12.25 };
    let parsed: ClientEvent = event.to_string().parse().unwrap();
    match parsed {
      ClientEvent::Seek { current_time } => assert_eq!(current_time, 12.25),
      other => panic!("unexpected event: {other:?}"),
    }
  }
}
