mod connection;
mod error;
mod playback;
mod room;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Message;
use parking_lot::RwLock;
use tracing::{debug, error, info};

pub use self::connection::{ConnId, ConnSender, Connection};
pub use self::error::RoomError;
pub use self::playback::{Playback, PlaybackSnapshot, PlaybackState};
pub use self::room::{ChatMessage, Room, RoomId};

#[derive(Clone, Debug)]
pub struct Config {
  /// Length of generated room codes, in hex characters.
  pub room_code_len: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self { room_code_len: 6 }
  }
}

/// Everything a joining connection needs to catch up with its room: the
/// playback snapshot and the full chat history, cloned in one transaction.
#[derive(Debug)]
pub struct JoinSnapshot {
  pub is_host: bool,
  pub video_id: String,
  pub video_state: PlaybackSnapshot,
  pub messages: Vec<ChatMessage>,
}

/// Registry of live rooms and connections. Rooms exist exactly as long as
/// they have members: created by an explicit request, destroyed under the
/// registry lock the instant the last member leaves.
#[derive(Clone, Debug, Default)]
pub struct Rooms {
  config: Arc<Config>,
  connections: Arc<RwLock<HashMap<ConnId, Arc<RwLock<Connection>>>>>,
  rooms: Arc<RwLock<HashMap<RoomId, Arc<RwLock<Room>>>>>,
}

impl Rooms {
  pub fn new(config: Config) -> Self {
    Self { config: Arc::new(config), ..Default::default() }
  }

  pub fn rooms(&self) -> Vec<Arc<RwLock<Room>>> {
    self.rooms.read_arc().values().cloned().collect()
  }

  pub fn connection_count(&self) -> usize {
    self.connections.read_arc().len()
  }

  pub fn add_connection(&self, sender: ConnSender) -> ConnId {
    let conn_id = ConnId::new();
    debug!("add connection");

    let connection = Arc::new(RwLock::new(Connection::new(conn_id, sender)));
    self.connections.write_arc().insert(conn_id, connection);
    conn_id
  }

  pub fn remove_connection(&self, conn_id: ConnId) -> Result<(), RoomError> {
    debug!("remove connection");

    self
      .connections
      .write_arc()
      .remove(&conn_id)
      .map(|_| ())
      .ok_or(RoomError::UnknownConnection(conn_id))
  }

  pub fn set_alive(&self, conn_id: ConnId, is_alive: bool) -> Result<(), RoomError> {
    debug!("set connection alive is_alive={is_alive}");

    self
      .connections
      .read_arc()
      .get(&conn_id)
      .ok_or(RoomError::UnknownConnection(conn_id))?
      .write_arc()
      .is_alive = is_alive;

    Ok(())
  }

  pub fn is_alive(&self, conn_id: ConnId) -> bool {
    self.connections.read_arc().get(&conn_id).map(|conn| conn.read_arc().is_alive).unwrap_or(false)
  }

  /// Creates a room with the caller as host and sole member. Codes are
  /// regenerated until they miss every live room, so a collision can never
  /// overwrite an existing room.
  pub fn create(&self, conn_id: ConnId) -> RoomId {
    let mut rooms = self.rooms.write_arc();
    let mut rng = rand::thread_rng();
    let room_id = loop {
      let candidate = RoomId::generate(&mut rng, self.config.room_code_len);
      if !rooms.contains_key(&candidate) {
        break candidate;
      }
    };

    info!("create room room_id={room_id}");
    let room = Room::new(room_id.clone(), conn_id);
    rooms.insert(room_id.clone(), Arc::new(RwLock::new(room)));
    room_id
  }

  /// Adds the connection to the room and returns the catch-up snapshot in
  /// the same transaction, so the joiner can never observe a mutation that
  /// happened between membership and snapshot.
  pub fn join(&self, conn_id: ConnId, room_id: &RoomId) -> Result<JoinSnapshot, RoomError> {
    debug!("join room room_id={room_id}");

    let room = self.get(room_id)?;
    let mut room = room.write_arc();
    room.members.insert(conn_id);

    Ok(JoinSnapshot {
      is_host: room.host == conn_id,
      video_id: room.playback.video_id.clone(),
      video_state: room.playback.snapshot(),
      messages: room.history.clone(),
    })
  }

  /// Removes the connection from the room. Returns true when the room was
  /// destroyed because this was the last member; destruction happens under
  /// the registry write lock, so an empty room is never observable.
  pub fn leave(&self, conn_id: ConnId, room_id: &RoomId) -> Result<bool, RoomError> {
    debug!("leave room room_id={room_id}");

    let mut rooms = self.rooms.write_arc();
    let room = rooms.get(room_id).ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;
    let empty = {
      let mut room = room.write_arc();
      room.members.remove(&conn_id);
      room.members.is_empty()
    };

    if empty {
      rooms.remove(room_id);
      info!("destroy room room_id={room_id}");
    }

    Ok(empty)
  }

  pub fn get(&self, room_id: &RoomId) -> Result<Arc<RwLock<Room>>, RoomError> {
    self
      .rooms
      .read_arc()
      .get(room_id)
      .cloned()
      .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))
  }

  pub fn load_video(&self, room_id: &RoomId, video_id: String) -> Result<(), RoomError> {
    debug!("load video room_id={room_id} video_id={video_id}");
    self.get(room_id)?.write_arc().playback.load(video_id);
    Ok(())
  }

  pub fn play(&self, room_id: &RoomId, time: f64) -> Result<(), RoomError> {
    debug!("play room_id={room_id} time={time}");
    self.get(room_id)?.write_arc().playback.play(time);
    Ok(())
  }

  pub fn pause(&self, room_id: &RoomId, time: f64) -> Result<(), RoomError> {
    debug!("pause room_id={room_id} time={time}");
    self.get(room_id)?.write_arc().playback.pause(time);
    Ok(())
  }

  pub fn seek(&self, room_id: &RoomId, time: f64) -> Result<(), RoomError> {
    debug!("seek room_id={room_id} time={time}");
    self.get(room_id)?.write_arc().playback.seek(time);
    Ok(())
  }

  pub fn append_chat(
    &self,
    conn_id: ConnId,
    room_id: &RoomId,
    text: String,
  ) -> Result<ChatMessage, RoomError> {
    debug!("append chat room_id={room_id}");
    Ok(self.get(room_id)?.write_arc().append_message(conn_id, text))
  }

  /// Include-sender fan-out: every current member receives the payload.
  /// Delivery is fire-and-forget; a dead recipient is logged, never retried.
  pub fn broadcast(&self, room_id: &RoomId, payload: String) -> Result<(), RoomError> {
    debug!("broadcast room_id={room_id} payload={payload}");

    self.get(room_id)?.read_arc().members.iter().for_each(|conn_id| {
      if let Err(e) = self.send(*conn_id, payload.clone()) {
        error!("{e}");
      }
    });

    Ok(())
  }

  /// Exclude-sender fan-out: the originator already holds the authoritative
  /// local state and must not re-apply its own action.
  pub fn broadcast_except(
    &self,
    sender_id: ConnId,
    room_id: &RoomId,
    payload: String,
  ) -> Result<(), RoomError> {
    debug!("broadcast except room_id={room_id} payload={payload}");

    self
      .get(room_id)?
      .read_arc()
      .members
      .iter()
      .filter(|other_id| **other_id != sender_id)
      .for_each(|conn_id| {
        if let Err(e) = self.send(*conn_id, payload.clone()) {
          error!("{e}");
        }
      });

    Ok(())
  }

  /// Targeted delivery to a single connection.
  pub fn send(&self, conn_id: ConnId, payload: String) -> Result<(), RoomError> {
    debug!("send payload={payload}");

    self
      .connections
      .read_arc()
      .get(&conn_id)
      .ok_or(RoomError::UnknownConnection(conn_id))?
      .read_arc()
      .sender
      .send(Ok(Message::Text(payload)))
      .map_err(|_| RoomError::ConnectionClosed(conn_id))
  }
}

#[cfg(test)]
mod tests {
  use axum::Error;
  use tokio::sync::mpsc::{self, UnboundedReceiver};

  use super::*;

  type Outbox = UnboundedReceiver<Result<Message, Error>>;

  fn registry() -> Rooms {
    Rooms::new(Config::default())
  }

  fn connect(rooms: &Rooms) -> (ConnId, Outbox) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (rooms.add_connection(sender), receiver)
  }

  fn drain(outbox: &mut Outbox) -> Vec<String> {
    let mut payloads = Vec::new();
    while let Ok(Ok(Message::Text(payload))) = outbox.try_recv() {
      payloads.push(payload);
    }
    payloads
  }

  #[test]
  fn create_registers_host_as_sole_member() {
    let rooms = registry();
    let (conn, _outbox) = connect(&rooms);
    let room_id = rooms.create(conn);

    let room = rooms.get(&room_id).unwrap();
    let room = room.read_arc();
    assert_eq!(room.host, conn);
    assert_eq!(room.members.len(), 1);
    assert!(room.members.contains(&conn));
  }

  #[test]
  fn created_room_ids_are_pairwise_distinct() {
    let rooms = registry();
    let (conn, _outbox) = connect(&rooms);
    let ids: Vec<RoomId> = (0..64).map(|_| rooms.create(conn)).collect();

    for (i, a) in ids.iter().enumerate() {
      for b in &ids[i + 1..] {
        assert_ne!(a, b);
      }
    }
  }

  #[test]
  fn join_unknown_room_is_not_found() {
    let rooms = registry();
    let (conn, _outbox) = connect(&rooms);
    let result = rooms.join(conn, &RoomId::from("zzzzzz"));
    assert!(matches!(result, Err(RoomError::RoomNotFound(_))));
  }

  #[test]
  fn membership_tracks_net_joins_minus_leaves() {
    let rooms = registry();
    let (a, _ra) = connect(&rooms);
    let (b, _rb) = connect(&rooms);
    let (c, _rc) = connect(&rooms);

    let room_id = rooms.create(a);
    rooms.join(b, &room_id).unwrap();
    rooms.join(c, &room_id).unwrap();
    assert_eq!(rooms.get(&room_id).unwrap().read_arc().members.len(), 3);

    assert!(!rooms.leave(b, &room_id).unwrap());
    assert_eq!(rooms.get(&room_id).unwrap().read_arc().members.len(), 2);

    assert!(!rooms.leave(a, &room_id).unwrap());
    assert!(rooms.leave(c, &room_id).unwrap());
    assert!(rooms.get(&room_id).is_err());
  }

  #[test]
  fn rejoining_host_is_still_host() {
    let rooms = registry();
    let (a, _ra) = connect(&rooms);
    let (b, _rb) = connect(&rooms);

    let room_id = rooms.create(a);
    rooms.join(b, &room_id).unwrap();
    let snapshot = rooms.join(a, &room_id).unwrap();
    assert!(snapshot.is_host);
    assert!(!rooms.join(b, &room_id).unwrap().is_host);
  }

  #[test]
  fn join_snapshot_carries_playback_and_history() {
    let rooms = registry();
    let (a, _ra) = connect(&rooms);
    let (b, _rb) = connect(&rooms);

    let room_id = rooms.create(a);
    rooms.load_video(&room_id, "xyz".into()).unwrap();
    rooms.seek(&room_id, 42.0).unwrap();
    rooms.append_chat(a, &room_id, "first".into()).unwrap();

    let snapshot = rooms.join(b, &room_id).unwrap();
    assert_eq!(snapshot.video_id, "xyz");
    assert!(!snapshot.video_state.playing);
    assert_eq!(snapshot.video_state.current_time, 42.0);
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].text, "first");
  }

  #[test]
  fn load_video_resets_stale_position() {
    let rooms = registry();
    let (a, _ra) = connect(&rooms);
    let room_id = rooms.create(a);

    rooms.load_video(&room_id, "xyz".into()).unwrap();
    rooms.play(&room_id, 120.0).unwrap();
    rooms.load_video(&room_id, "abc".into()).unwrap();

    let room = rooms.get(&room_id).unwrap();
    let room = room.read_arc();
    assert_eq!(room.playback.current_time, 0.0);
    assert!(!room.playback.playing);
  }

  #[test]
  fn broadcast_includes_sender() {
    let rooms = registry();
    let (a, mut ra) = connect(&rooms);
    let (b, mut rb) = connect(&rooms);
    let (c, mut rc) = connect(&rooms);

    let room_id = rooms.create(a);
    rooms.join(b, &room_id).unwrap();
    rooms.join(c, &room_id).unwrap();

    rooms.broadcast(&room_id, "hello".into()).unwrap();
    assert_eq!(drain(&mut ra), vec!["hello"]);
    assert_eq!(drain(&mut rb), vec!["hello"]);
    assert_eq!(drain(&mut rc), vec!["hello"]);
  }

  #[test]
  fn broadcast_except_excludes_sender() {
    let rooms = registry();
    let (a, mut ra) = connect(&rooms);
    let (b, mut rb) = connect(&rooms);
    let (c, mut rc) = connect(&rooms);

    let room_id = rooms.create(a);
    rooms.join(b, &room_id).unwrap();
    rooms.join(c, &room_id).unwrap();

    rooms.broadcast_except(a, &room_id, "seek".into()).unwrap();
    assert!(drain(&mut ra).is_empty());
    assert_eq!(drain(&mut rb), vec!["seek"]);
    assert_eq!(drain(&mut rc), vec!["seek"]);
  }

  #[test]
  fn send_targets_a_single_connection() {
    let rooms = registry();
    let (a, mut ra) = connect(&rooms);
    let (_b, mut rb) = connect(&rooms);

    rooms.send(a, "only you".into()).unwrap();
    assert_eq!(drain(&mut ra), vec!["only you"]);
    assert!(drain(&mut rb).is_empty());
  }

  #[test]
  fn send_to_removed_connection_fails() {
    let rooms = registry();
    let (a, _ra) = connect(&rooms);
    rooms.remove_connection(a).unwrap();
    assert!(matches!(rooms.send(a, "late".into()), Err(RoomError::UnknownConnection(_))));
  }

  #[test]
  fn broadcast_tolerates_dead_recipient() {
    let rooms = registry();
    let (a, mut ra) = connect(&rooms);
    let (b, rb) = connect(&rooms);

    let room_id = rooms.create(a);
    rooms.join(b, &room_id).unwrap();
    drop(rb);

    rooms.broadcast(&room_id, "still delivered".into()).unwrap();
    assert_eq!(drain(&mut ra), vec!["still delivered"]);
  }
}
