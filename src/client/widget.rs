/// Capability surface of the embedded video player. The widget's internal
/// playback engine is a collaborator; the agent only drives this interface
/// and listens to its play/pause notifications.
pub trait VideoWidget {
  fn load_video(&mut self, video_id: &str, start_time: Option<f64>);
  fn play(&mut self);
  fn pause(&mut self);
  fn seek_to(&mut self, time: f64);
  fn current_time(&self) -> f64;
}

/// The two widget notifications the agent reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
  Playing,
  Paused,
}
