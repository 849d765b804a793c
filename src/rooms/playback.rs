use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Authoritative playback state of a room. `current_time` is a snapshot of
/// whichever client last reported it, never advanced between reports.
#[derive(Clone, Debug)]
pub struct Playback {
  pub video_id: String,
  pub playing: bool,
  pub current_time: f64,
  pub updated_at: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
  NoVideo,
  Playing,
  Paused,
}

/// Wire shape of the playback snapshot handed to a joining connection.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
  pub playing: bool,
  pub current_time: f64,
}

impl Playback {
  pub fn new() -> Self {
    Self { video_id: String::new(), playing: false, current_time: 0.0, updated_at: Instant::now() }
  }

  /// Loading always lands paused at 0, whatever was playing before. A stale
  /// time from the previous video must not leak to new joiners.
  pub fn load(&mut self, video_id: String) {
    self.video_id = video_id;
    self.playing = false;
    self.set_time(0.0);
  }

  pub fn play(&mut self, time: f64) {
    self.playing = true;
    self.set_time(time);
  }

  pub fn pause(&mut self, time: f64) {
    self.playing = false;
    self.set_time(time);
  }

  pub fn seek(&mut self, time: f64) {
    self.set_time(time);
  }

  pub fn state(&self) -> PlaybackState {
    if self.playing {
      PlaybackState::Playing
    } else if self.video_id.is_empty() {
      PlaybackState::NoVideo
    } else {
      PlaybackState::Paused
    }
  }

  pub fn snapshot(&self) -> PlaybackSnapshot {
    PlaybackSnapshot { playing: self.playing, current_time: self.current_time }
  }

  fn set_time(&mut self, time: f64) {
    self.current_time = if time.is_finite() { time.max(0.0) } else { 0.0 };
    self.updated_at = Instant::now();
  }
}

impl Default for Playback {
  fn default() -> Self {
    Self::new()
  }
}
