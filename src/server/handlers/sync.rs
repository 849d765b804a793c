use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::Error;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::StreamExt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_stream::wrappers::{IntervalStream, UnboundedReceiverStream};
use tracing::{debug, error, info, instrument};

use crate::protocol::{ClientEvent, ServerEvent};
use crate::rooms::{ConnId, RoomError, RoomId, Rooms};
use crate::server::session::Session;
use crate::server::state::ServerState;

pub(crate) async fn sync(
  ws: WebSocketUpgrade,
  State(state): State<ServerState>,
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
  ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

#[instrument(name = "socket", skip_all, fields(addr = addr.to_string()))]
async fn handle_socket(socket: WebSocket, state: ServerState, addr: SocketAddr) {
  let (ws_sender, ws_receiver) = socket.split();
  let (sender, receiver) = mpsc::unbounded_channel();
  let conn_id = state.rooms.add_connection(sender.clone());
  info!("{conn_id} connected");

  let mut session = Session::new(conn_id);
  tokio::select! {
    _ = handle_channel(receiver, ws_sender) => {},
    _ = handle_heartbeats(conn_id, sender, state.rooms.clone()) => {},
    _ = handle_messages(&mut session, ws_receiver, state.rooms.clone()) => {},
  }

  // Membership cleanup: the room is notified if it survives, destroyed if
  // this was its last member.
  if let Some(room_id) = session.release() {
    leave_room(&state.rooms, conn_id, &room_id);
  }
  if let Err(e) = state.rooms.remove_connection(conn_id) {
    error!("{e}");
  }
}

async fn handle_channel(
  receiver: UnboundedReceiver<Result<Message, Error>>,
  ws_sender: SplitSink<WebSocket, Message>,
) -> Result<()> {
  UnboundedReceiverStream::new(receiver).forward(ws_sender).await.map_err(Into::into)
}

#[instrument(name = "heartbeat", skip_all, fields(conn = conn_id.to_string()))]
async fn handle_heartbeats(
  conn_id: ConnId,
  sender: UnboundedSender<Result<Message, Error>>,
  rooms: Rooms,
) -> Result<()> {
  let mut stream = IntervalStream::new(tokio::time::interval(Duration::from_millis(10_000)));
  while stream.next().await.is_some() {
    if rooms.is_alive(conn_id) {
      debug!("send ping");
      rooms.set_alive(conn_id, false)?;
      sender.send(Ok(Message::Ping("".into())))?;
    } else {
      info!("connection timeout");
      break;
    }
  }
  Ok(())
}

#[instrument(name = "message", skip_all, fields(conn = session.conn_id().to_string()))]
async fn handle_messages(session: &mut Session, mut ws_receiver: SplitStream<WebSocket>, rooms: Rooms) {
  while let Some(Ok(message)) = ws_receiver.next().await {
    if let Message::Close(_) = message {
      info!("disconnected");
      break;
    }

    if let Err(e) = handle_message(message, session, &rooms) {
      error!("{e}");
    }
  }
}

fn handle_message(message: Message, session: &mut Session, rooms: &Rooms) -> Result<()> {
  match message {
    Message::Text(payload) => handle_event(payload, session, rooms),
    Message::Binary(_) => bail!("unsupported binary message"),
    Message::Pong(_) => {
      debug!("recv pong");
      rooms.set_alive(session.conn_id(), true).map_err(Into::into)
    }
    _ => Ok(()),
  }
}

fn handle_event(payload: String, session: &mut Session, rooms: &Rooms) -> Result<()> {
  let event: ClientEvent = payload.parse()?;
  debug!("recv event event={event}");
  let conn_id = session.conn_id();

  match event {
    ClientEvent::CreateRoom => {
      // A connection holds at most one membership: switching rooms leaves
      // the previous one first.
      if let Some(prev) = session.release() {
        leave_room(rooms, conn_id, &prev);
      }
      let room_id = rooms.create(conn_id);
      session.bind(room_id.clone());
      rooms.send(conn_id, ServerEvent::RoomCreated { room_id, is_host: true }.to_string())?;
    }
    ClientEvent::JoinRoom { room_id } => {
      // Rejoining the current room must not pass through leave: that would
      // destroy a room whose only member is the rejoiner.
      match session.release() {
        Some(prev) if prev != room_id => leave_room(rooms, conn_id, &prev),
        _ => {}
      }
      match rooms.join(conn_id, &room_id) {
        Ok(snapshot) => {
          session.bind(room_id.clone());
          let reply = ServerEvent::RoomJoined {
            success: true,
            is_host: snapshot.is_host,
            video_id: snapshot.video_id,
            video_state: snapshot.video_state,
            messages: snapshot.messages,
          };
          rooms.send(conn_id, reply.to_string())?;
          rooms.broadcast_except(
            conn_id,
            &room_id,
            ServerEvent::UserJoined { user_id: conn_id }.to_string(),
          )?;
        }
        Err(RoomError::RoomNotFound(_)) => {
          let reply = ServerEvent::JoinFailed { success: false, error: "Room not found".into() };
          rooms.send(conn_id, reply.to_string())?;
        }
        Err(e) => return Err(e.into()),
      }
    }
    ClientEvent::VideoChange { video_id } => {
      let room_id = bound_room(session)?;
      rooms.load_video(&room_id, video_id.clone())?;
      rooms.broadcast_except(conn_id, &room_id, ServerEvent::VideoChange { video_id }.to_string())?;
    }
    ClientEvent::Play { current_time } => {
      let room_id = bound_room(session)?;
      rooms.play(&room_id, current_time)?;
      rooms.broadcast_except(conn_id, &room_id, ServerEvent::Play { current_time }.to_string())?;
    }
    ClientEvent::Pause { current_time } => {
      let room_id = bound_room(session)?;
      rooms.pause(&room_id, current_time)?;
      rooms.broadcast_except(conn_id, &room_id, ServerEvent::Pause { current_time }.to_string())?;
    }
    ClientEvent::Seek { current_time } => {
      let room_id = bound_room(session)?;
      rooms.seek(&room_id, current_time)?;
      rooms.broadcast_except(conn_id, &room_id, ServerEvent::Seek { current_time }.to_string())?;
    }
    ClientEvent::ChatMessage { text } => {
      let room_id = bound_room(session)?;
      let text = text.trim().to_owned();
      if text.is_empty() {
        bail!("empty chat message");
      }
      let message = rooms.append_chat(conn_id, &room_id, text)?;
      rooms.broadcast(&room_id, ServerEvent::ChatMessage(message).to_string())?;
    }
    ClientEvent::Ping => rooms.send(conn_id, ServerEvent::Pong.to_string())?,
  }

  Ok(())
}

/// Events from a connection with no bound room are dropped; the caller logs
/// the error and moves on.
fn bound_room(session: &Session) -> Result<RoomId> {
  session
    .room()
    .cloned()
    .with_context(|| format!("connection {} is not in a room", session.conn_id()))
}

fn leave_room(rooms: &Rooms, conn_id: ConnId, room_id: &RoomId) {
  match rooms.leave(conn_id, room_id) {
    // Destroyed with its last member, nothing left to notify.
    Ok(true) => {}
    Ok(false) => {
      let event = ServerEvent::UserLeft { user_id: conn_id };
      if let Err(e) = rooms.broadcast(room_id, event.to_string()) {
        error!("{e}");
      }
    }
    Err(e) => error!("{e}"),
  }
}
