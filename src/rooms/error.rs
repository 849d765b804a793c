use thiserror::Error;

use super::connection::ConnId;
use super::room::RoomId;

#[derive(Debug, Error)]
pub enum RoomError {
  #[error("room {0} not found")]
  RoomNotFound(RoomId),

  #[error("connection {0} does not exist")]
  UnknownConnection(ConnId),

  #[error("connection {0} is gone")]
  ConnectionClosed(ConnId),
}
