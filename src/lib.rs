//! Lock-step shared video playback over WebSocket: an authoritative room
//! registry on the server side, and a client agent that reconciles a local
//! video widget against remote state without echoing its own actions.

mod client;
mod protocol;
mod rooms;
mod server;

pub use client::{
  PlayerState, SyncAgent, SyncError, VideoWidget, DRIFT_POLL_INTERVAL, DRIFT_THRESHOLD,
};
pub use protocol::{ClientEvent, ServerEvent};
pub use rooms::{
  ChatMessage, Config, ConnId, JoinSnapshot, Playback, PlaybackSnapshot, PlaybackState, Room,
  RoomError, RoomId, Rooms,
};
pub use server::{app, Server};
