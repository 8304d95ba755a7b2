use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::constants::constants;

/// Playback states reported by the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetState {
  Unstarted,
  Playing,
  Paused,
  Ended,
  Buffering,
  Cued,
}

/// Inbound notifications from the widget and the poll timer.
///
/// Widget events carry the number of the load they belong to, so events that
/// were queued for an earlier load can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
  /// A widget instance finished loading its media and accepts commands.
  Ready(u64),
  StateChange(u64, WidgetState),
  /// Poll timer fired; the controller re-reads position and duration.
  Tick,
}

/// How the widget presents loaded media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
  pub width: u32,
  pub height: u32,
  pub autoplay: bool,
  /// Show the widget's own on-screen controls.
  pub controls: bool,
  pub audio_only: bool,
}

impl Default for LoadOptions {
  fn default() -> Self {
    let c = constants();
    Self { width: c.player_width, height: c.player_height, autoplay: true, controls: false, audio_only: true }
  }
}

/// Command surface of an external media widget. Events come back on the
/// `PlayerEvent` channel the widget was created with, tagged with the `load`
/// number of the request that produced them.
#[async_trait]
pub trait Widget: Send {
  async fn load(&mut self, video_id: &str, load: u64, options: &LoadOptions) -> Result<()>;
  async fn play(&mut self) -> Result<()>;
  async fn pause(&mut self) -> Result<()>;
  async fn seek_to(&mut self, secs: f64) -> Result<()>;
  async fn set_volume(&mut self, level: u8) -> Result<()>;
  async fn current_time(&mut self) -> Result<f64>;
  async fn duration(&mut self) -> Result<f64>;
  /// Tear down the widget. Later calls may fail.
  async fn shutdown(&mut self) -> Result<()>;
}

/// Fixed-interval tick source. The task is aborted when the handle is dropped.
pub struct PollTimer {
  handle: JoinHandle<()>,
}

impl PollTimer {
  pub fn spawn(period: Duration, tx: mpsc::UnboundedSender<PlayerEvent>) -> Self {
    let handle = tokio::spawn(async move {
      let mut interval = tokio::time::interval(period);
      interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      // The first tick completes immediately.
      interval.tick().await;
      loop {
        interval.tick().await;
        if tx.send(PlayerEvent::Tick).is_err() {
          break;
        }
      }
    });
    Self { handle }
  }
}

impl Drop for PollTimer {
  fn drop(&mut self) {
    debug!("poll timer disposed");
    self.handle.abort();
  }
}

/// Wraps a widget and tracks which media it holds.
///
/// A load only reaches the widget when the identifier changes (or a reload is
/// forced). Commands are dropped until the widget reports ready for the
/// current load. A failed load leaves nothing recorded, so the next request
/// for the same identifier tries again.
pub struct EmbeddedPlayer {
  widget: Box<dyn Widget>,
  options: LoadOptions,
  loaded_id: Option<String>,
  ready: bool,
  /// Number of the most recent load request.
  load: u64,
}

impl EmbeddedPlayer {
  pub fn new(widget: Box<dyn Widget>, options: LoadOptions) -> Self {
    Self { widget, options, loaded_id: None, ready: false, load: 0 }
  }

  /// Whether a widget event tagged with `load` belongs to the current load.
  pub fn is_current_load(&self, load: u64) -> bool {
    self.loaded_id.is_some() && load == self.load
  }

  pub fn is_ready(&self) -> bool {
    self.ready
  }

  pub fn loaded_id(&self) -> Option<&str> {
    self.loaded_id.as_deref()
  }

  /// Point the widget at `video_id`. Returns `true` when a new instance was started.
  pub async fn show(&mut self, video_id: &str, force: bool) -> Result<bool> {
    if !force && self.loaded_id.as_deref() == Some(video_id) {
      return Ok(false);
    }
    self.ready = false;
    self.loaded_id = None;
    self.load += 1;
    self.widget.load(video_id, self.load, &self.options).await?;
    self.loaded_id = Some(video_id.to_string());
    Ok(true)
  }

  #[cfg(test)]
  pub(crate) fn current_load(&self) -> u64 {
    self.load
  }

  pub fn mark_ready(&mut self) {
    self.ready = self.loaded_id.is_some();
  }

  /// Mutable access to the widget, only while an instance is ready.
  pub fn instance(&mut self) -> Option<&mut (dyn Widget + 'static)> {
    if self.ready { Some(self.widget.as_mut()) } else { None }
  }

  pub async fn shutdown(&mut self) -> Result<()> {
    self.ready = false;
    self.loaded_id = None;
    self.widget.shutdown().await
  }
}
