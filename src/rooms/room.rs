use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::connection::ConnId;
use super::playback::Playback;

const ROOM_CODE_CHARS: &[u8] = b"0123456789abcdef";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
  pub(super) fn generate(rng: &mut impl Rng, len: usize) -> Self {
    Self((0..len).map(|_| ROOM_CODE_CHARS[rng.gen_range(0..ROOM_CODE_CHARS.len())] as char).collect())
  }
}

impl fmt::Display for RoomId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for RoomId {
  fn from(s: &str) -> Self {
    Self(s.to_lowercase())
  }
}

/// One chat line. Immutable once created, lives for the room's lifetime.
/// Ids are assigned by the room, monotonic from 1.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatMessage {
  pub id: u64,
  pub text: String,
  #[serde(rename = "userId")]
  pub author: ConnId,
  pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Room {
  pub id: RoomId,
  pub host: ConnId,
  pub members: HashSet<ConnId>,
  pub playback: Playback,
  pub history: Vec<ChatMessage>,
  next_message_id: u64,
}

impl Room {
  pub(super) fn new(id: RoomId, host: ConnId) -> Self {
    Self {
      id,
      host,
      members: HashSet::from([host]),
      playback: Playback::new(),
      history: Vec::new(),
      next_message_id: 1,
    }
  }

  pub(super) fn append_message(&mut self, author: ConnId, text: String) -> ChatMessage {
    let message = ChatMessage { id: self.next_message_id, text, author, timestamp: Utc::now() };
    self.next_message_id += 1;
    self.history.push(message.clone());
    message
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn creator_is_host_and_sole_member() {
    let host = ConnId::new();
    let room = Room::new(RoomId::from("ab12cd"), host);
    assert_eq!(room.host, host);
    assert_eq!(room.members, HashSet::from([host]));
    assert!(room.history.is_empty());
  }

  #[test]
  fn message_ids_are_monotonic_from_one() {
    let host = ConnId::new();
    let mut room = Room::new(RoomId::from("ab12cd"), host);
    let first = room.append_message(host, "hello".into());
    let second = room.append_message(host, "again".into());
    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);
    assert_eq!(room.history.len(), 2);
  }

  #[test]
  fn generated_codes_use_hex_alphabet() {
    let mut rng = rand::thread_rng();
    let id = RoomId::generate(&mut rng, 6);
    assert_eq!(id.0.len(), 6);
    assert!(id.0.bytes().all(|b| ROOM_CODE_CHARS.contains(&b)));
  }
}
