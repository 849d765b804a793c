mod agent;
mod widget;

pub use self::agent::{SyncAgent, SyncError, DRIFT_POLL_INTERVAL, DRIFT_THRESHOLD};
pub use self::widget::{PlayerState, VideoWidget};
