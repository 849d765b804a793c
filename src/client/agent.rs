use std::collections::VecDeque;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::protocol::{ClientEvent, ServerEvent};
use crate::rooms::{ChatMessage, RoomId};

use super::widget::{PlayerState, VideoWidget};

/// How often the driver should call [`SyncAgent::on_drift_tick`].
pub const DRIFT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Divergence between the widget clock and the last reported time beyond
/// which a tick is treated as a user scrub and reported as a seek.
pub const DRIFT_THRESHOLD: f64 = 2.0;

/// Drift ticks a pending expectation survives before it is released. Covers
/// widgets that never acknowledge a programmatic change (e.g. a pause
/// applied while already paused at the engine level).
const STALE_SUPPRESSION_TICKS: u8 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncError {
  #[error("not in a room")]
  NotInRoom,

  #[error("unrecognized video url")]
  InvalidVideoUrl,

  #[error("empty chat message")]
  EmptyMessage,
}

/// Echo suppression: every programmatic state change registers the widget
/// state it expects to be notified of, tagged with a sequence number. The
/// matching notification is absorbed once instead of being re-emitted as a
/// user action. Wall-clock timers play no part.
#[derive(Debug, Default)]
struct Suppressor {
  seq: u64,
  pending: VecDeque<Expectation>,
}

#[derive(Debug)]
struct Expectation {
  seq: u64,
  state: PlayerState,
  age: u8,
}

impl Suppressor {
  fn expect(&mut self, state: PlayerState) {
    self.seq += 1;
    debug!("expect ack state={state:?} seq={}", self.seq);
    self.pending.push_back(Expectation { seq: self.seq, state, age: 0 });
  }

  /// Consumes the oldest pending expectation when the notification matches
  /// it. A notification that contradicts the expected sequence means the
  /// widget diverged from the script; stop second-guessing it.
  fn absorb(&mut self, state: PlayerState) -> bool {
    match self.pending.front() {
      Some(expectation) if expectation.state == state => {
        debug!("absorb ack seq={}", expectation.seq);
        self.pending.pop_front();
        true
      }
      Some(_) => {
        self.pending.clear();
        false
      }
      None => false,
    }
  }

  /// Ages pending expectations by one drift tick, dropping them once the
  /// widget has clearly declined to acknowledge. Returns whether anything
  /// was pending when the tick arrived.
  fn tick(&mut self) -> bool {
    if self.pending.is_empty() {
      return false;
    }
    for expectation in &mut self.pending {
      expectation.age += 1;
    }
    if self.pending.front().map_or(false, |e| e.age >= STALE_SUPPRESSION_TICKS) {
      self.pending.clear();
    }
    true
  }
}

/// Client-side reconciliation agent. Applies authoritative room state to the
/// local widget, reports genuine user actions upstream, and suppresses the
/// widget's own feedback for changes it applied itself.
///
/// The agent is a plain state machine: the surrounding client wires widget
/// notifications into [`Self::on_player_state_change`], inbound server
/// events into [`Self::on_server_event`], and a [`DRIFT_POLL_INTERVAL`]
/// timer into [`Self::on_drift_tick`].
pub struct SyncAgent<W> {
  widget: W,
  outbound: UnboundedSender<ClientEvent>,
  room: Option<RoomId>,
  pending_join: Option<RoomId>,
  is_host: bool,
  player_state: Option<PlayerState>,
  suppress: Suppressor,
  /// Last playback time this agent reported to the server.
  reference_time: f64,
  messages: Vec<ChatMessage>,
  last_error: Option<String>,
}

impl<W: VideoWidget> SyncAgent<W> {
  pub fn new(widget: W, outbound: UnboundedSender<ClientEvent>) -> Self {
    Self {
      widget,
      outbound,
      room: None,
      pending_join: None,
      is_host: false,
      player_state: None,
      suppress: Suppressor::default(),
      reference_time: 0.0,
      messages: Vec::new(),
      last_error: None,
    }
  }

  pub fn room(&self) -> Option<&RoomId> {
    self.room.as_ref()
  }

  pub fn is_host(&self) -> bool {
    self.is_host
  }

  pub fn messages(&self) -> &[ChatMessage] {
    &self.messages
  }

  pub fn last_error(&self) -> Option<&str> {
    self.last_error.as_deref()
  }

  pub fn create_room(&mut self) {
    self.emit(ClientEvent::CreateRoom);
  }

  pub fn join_room(&mut self, room_id: RoomId) {
    self.pending_join = Some(room_id.clone());
    self.emit(ClientEvent::JoinRoom { room_id });
  }

  /// Loads a video from a pasted URL and announces it to the room. Rejected
  /// at this edge, before any protocol event, when the URL has no
  /// recognizable video id.
  pub fn load_video(&mut self, url: &str) -> Result<(), SyncError> {
    if self.room.is_none() {
      return Err(SyncError::NotInRoom);
    }
    let video_id = extract_video_id(url).ok_or(SyncError::InvalidVideoUrl)?.to_owned();

    self.apply_load(&video_id, None);
    self.emit(ClientEvent::VideoChange { video_id });
    Ok(())
  }

  pub fn send_chat(&mut self, text: &str) -> Result<(), SyncError> {
    if self.room.is_none() {
      return Err(SyncError::NotInRoom);
    }
    let text = text.trim();
    if text.is_empty() {
      return Err(SyncError::EmptyMessage);
    }
    self.emit(ClientEvent::ChatMessage { text: text.to_owned() });
    Ok(())
  }

  pub fn on_server_event(&mut self, event: ServerEvent) {
    match event {
      ServerEvent::RoomCreated { room_id, is_host } => {
        self.room = Some(room_id);
        self.is_host = is_host;
        self.messages.clear();
        self.reference_time = 0.0;
      }
      ServerEvent::RoomJoined { is_host, video_id, video_state, messages, .. } => {
        let Some(room_id) = self.pending_join.take() else {
          warn!("join reply without a pending join");
          return;
        };
        self.room = Some(room_id);
        self.is_host = is_host;
        self.messages = messages;

        // Catch up with the room: load at the reported position, then match
        // the authoritative play/pause state, all under suppression.
        if !video_id.is_empty() {
          self.apply_load(&video_id, Some(video_state.current_time));
          if video_state.playing {
            self.apply_state(PlayerState::Playing);
          } else {
            self.apply_state(PlayerState::Paused);
          }
        }
      }
      ServerEvent::JoinFailed { error, .. } => {
        self.pending_join = None;
        self.last_error = Some(error);
      }
      ServerEvent::VideoChange { video_id } => {
        self.apply_load(&video_id, None);
      }
      ServerEvent::Play { current_time } => {
        self.widget.seek_to(current_time);
        self.apply_state(PlayerState::Playing);
        self.reference_time = current_time;
      }
      ServerEvent::Pause { current_time } => {
        self.widget.seek_to(current_time);
        self.apply_state(PlayerState::Paused);
        self.reference_time = current_time;
      }
      ServerEvent::Seek { current_time } => {
        self.widget.seek_to(current_time);
        self.reference_time = current_time;
      }
      ServerEvent::ChatMessage(message) => self.messages.push(message),
      ServerEvent::UserJoined { user_id } => debug!("user joined user_id={user_id}"),
      ServerEvent::UserLeft { user_id } => debug!("user left user_id={user_id}"),
      ServerEvent::Pong => {}
    }
  }

  /// The widget's native state-change notification: the only trigger for
  /// outbound play/pause events. Notifications acknowledging a change this
  /// agent applied itself, or re-asserting the current state, are not
  /// user actions and are not emitted.
  pub fn on_player_state_change(&mut self, state: PlayerState) {
    if self.suppress.absorb(state) {
      self.player_state = Some(state);
      return;
    }
    if self.player_state == Some(state) {
      return;
    }
    self.player_state = Some(state);

    if self.room.is_none() {
      return;
    }
    let current_time = self.widget.current_time();
    match state {
      PlayerState::Playing => self.emit(ClientEvent::Play { current_time }),
      PlayerState::Paused => self.emit(ClientEvent::Pause { current_time }),
    }
    self.reference_time = current_time;
  }

  /// Periodic drift poll. A jump beyond [`DRIFT_THRESHOLD`] signals a user
  /// scrub and is reported as a seek; normal forward playback just moves
  /// the reference along without emitting anything.
  pub fn on_drift_tick(&mut self) {
    if self.room.is_none() {
      return;
    }
    if self.suppress.tick() {
      return;
    }

    let current_time = self.widget.current_time();
    if (current_time - self.reference_time).abs() > DRIFT_THRESHOLD {
      self.emit(ClientEvent::Seek { current_time });
    }
    self.reference_time = current_time;
  }

  fn apply_load(&mut self, video_id: &str, start_time: Option<f64>) {
    if self.player_state != Some(PlayerState::Paused) {
      self.suppress.expect(PlayerState::Paused);
    }
    self.widget.load_video(video_id, start_time);
    self.player_state = Some(PlayerState::Paused);
    self.reference_time = start_time.unwrap_or(0.0);
  }

  fn apply_state(&mut self, target: PlayerState) {
    if self.player_state != Some(target) {
      self.suppress.expect(target);
    }
    match target {
      PlayerState::Playing => self.widget.play(),
      PlayerState::Paused => self.widget.pause(),
    }
    self.player_state = Some(target);
  }

  fn emit(&mut self, event: ClientEvent) {
    debug!("emit event event={event}");
    if self.outbound.send(event).is_err() {
      warn!("outbound channel closed");
    }
  }
}

/// Pulls the video id out of the usual URL shapes. Anything else is
/// unparseable input and stays client-side.
pub(crate) fn extract_video_id(url: &str) -> Option<&str> {
  let rest = ["youtube.com/watch?v=", "youtu.be/", "youtube.com/embed/"]
    .iter()
    .find_map(|marker| url.split_once(marker).map(|(_, rest)| rest))?;

  let id = rest.split(['&', '?', '#', '/']).next()?;
  (!id.is_empty()).then_some(id)
}
