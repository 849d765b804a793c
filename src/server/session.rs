use crate::rooms::{ConnId, RoomId};

/// Per-connection binding: one connection is a member of at most one room.
/// Owned by the socket task, mutated only by its message loop.
#[derive(Debug)]
pub(crate) struct Session {
  conn_id: ConnId,
  room: Option<RoomId>,
}

impl Session {
  pub fn new(conn_id: ConnId) -> Self {
    Self { conn_id, room: None }
  }

  pub fn conn_id(&self) -> ConnId {
    self.conn_id
  }

  pub fn room(&self) -> Option<&RoomId> {
    self.room.as_ref()
  }

  pub fn bind(&mut self, room_id: RoomId) {
    self.room = Some(room_id);
  }

  pub fn release(&mut self) -> Option<RoomId> {
    self.room.take()
  }
}
