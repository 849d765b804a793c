use std::fmt;

use axum::extract::ws::Message;
use axum::Error;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use ulid::Ulid;

pub type ConnSender = UnboundedSender<Result<Message, Error>>;

/// Transient identifier bound to one live connection. Confers no identity
/// beyond the connection's lifetime.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct ConnId(Ulid);

impl ConnId {
  pub(crate) fn new() -> Self {
    Self(Ulid::new())
  }
}

impl fmt::Display for ConnId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0.to_string().to_lowercase())
  }
}

#[derive(Debug)]
pub struct Connection {
  pub id: ConnId,
  pub is_alive: bool,
  pub sender: ConnSender,
}

impl Connection {
  pub(super) fn new(id: ConnId, sender: ConnSender) -> Self {
    Self { id, is_alive: true, sender }
  }
}
