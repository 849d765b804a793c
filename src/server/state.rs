use crate::rooms::Rooms;

#[derive(Clone)]
pub(crate) struct ServerState {
  pub rooms: Rooms,
}

impl ServerState {
  pub fn new(rooms: Rooms) -> Self {
    Self { rooms }
  }
}
