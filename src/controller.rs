//! Playback and playlist state machine.
//!
//! The controller owns the playlist sequence, the current index, the playback
//! state, volume and the mirrored position/duration. It is the only code that
//! issues commands to the embedded player.

use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::Video;
use crate::player::{EmbeddedPlayer, PlayerEvent, PollTimer, WidgetState};
use crate::transport::TransportCommand;

/// Behavioral state of the player. Every non-idle variant carries a valid
/// index into the playlist sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
  /// No media loaded.
  Idle,
  Paused(usize),
  Playing(usize),
  /// The entry at the index finished and nothing followed it.
  Ended(usize),
}

impl PlaybackState {
  pub fn index(self) -> Option<usize> {
    match self {
      PlaybackState::Idle => None,
      PlaybackState::Paused(i) | PlaybackState::Playing(i) | PlaybackState::Ended(i) => Some(i),
    }
  }

  pub fn is_playing(self) -> bool {
    matches!(self, PlaybackState::Playing(_))
  }
}

pub struct Controller {
  player: EmbeddedPlayer,
  playlist: Vec<Video>,
  state: PlaybackState,
  volume: u8,
  position: f64,
  duration: f64,
  events: mpsc::UnboundedSender<PlayerEvent>,
  poll_period: Duration,
  poll: Option<PollTimer>,
}

impl Controller {
  pub fn new(
    player: EmbeddedPlayer,
    volume: u8,
    poll_period: Duration,
    events: mpsc::UnboundedSender<PlayerEvent>,
  ) -> Self {
    Self {
      player,
      playlist: Vec::new(),
      state: PlaybackState::Idle,
      volume: volume.min(100),
      position: 0.0,
      duration: 0.0,
      events,
      poll_period,
      poll: None,
    }
  }

  pub fn state(&self) -> PlaybackState {
    self.state
  }

  pub fn playlist(&self) -> &[Video] {
    &self.playlist
  }

  pub fn current_index(&self) -> Option<usize> {
    self.state.index()
  }

  pub fn current(&self) -> Option<&Video> {
    self.state.index().and_then(|i| self.playlist.get(i))
  }

  pub fn is_current(&self, video_id: &str) -> bool {
    self.current().is_some_and(|v| v.id == video_id)
  }

  pub fn volume(&self) -> u8 {
    self.volume
  }

  pub fn position(&self) -> f64 {
    self.position
  }

  pub fn duration(&self) -> f64 {
    self.duration
  }

  pub fn has_next(&self) -> bool {
    self.state.index().is_some_and(|i| i + 1 < self.playlist.len())
  }

  pub fn has_previous(&self) -> bool {
    self.state.index().is_some_and(|i| i > 0)
  }

  /// An entry is current but the widget has not reported ready for it yet.
  pub fn is_loading(&self) -> bool {
    matches!(self.state, PlaybackState::Paused(_) | PlaybackState::Playing(_)) && !self.player.is_ready()
  }

  /// Replace the playlist with `video` and load it.
  pub async fn play(&mut self, video: Video) -> Result<()> {
    info!(video_id = %video.id, title = %video.title, "play");
    self.playlist = vec![video];
    self.enter(0, false).await
  }

  /// Append to the playlist without touching playback.
  pub fn add(&mut self, video: Video) {
    debug!(video_id = %video.id, len = self.playlist.len() + 1, "added to playlist");
    self.playlist.push(video);
  }

  pub async fn next(&mut self) -> Result<()> {
    if !self.has_next() {
      return Ok(());
    }
    let Some(i) = self.state.index() else { return Ok(()) };
    self.enter(i + 1, false).await
  }

  pub async fn previous(&mut self) -> Result<()> {
    if !self.has_previous() {
      return Ok(());
    }
    let Some(i) = self.state.index() else { return Ok(()) };
    self.enter(i - 1, false).await
  }

  /// Load the playlist entry at `index`. Out-of-range indices are ignored.
  pub async fn jump_to(&mut self, index: usize) -> Result<()> {
    if index >= self.playlist.len() {
      return Ok(());
    }
    self.enter(index, false).await
  }

  /// Make `index` current and point the player at it. The state stays paused
  /// until the widget reports that playback started. When the load fails the
  /// entry is left as ended, so a toggle retries it.
  async fn enter(&mut self, index: usize, force: bool) -> Result<()> {
    self.state = PlaybackState::Paused(index);
    self.position = 0.0;
    self.duration = 0.0;
    let id = self.playlist[index].id.clone();
    match self.player.show(&id, force).await {
      Ok(started) => {
        if started {
          // New widget instance: the old timer must not outlive it.
          self.poll = None;
        }
        Ok(())
      }
      Err(e) => {
        warn!(video_id = %id, err = %format!("{:#}", e), "load failed");
        self.poll = None;
        self.state = PlaybackState::Ended(index);
        Err(e)
      }
    }
  }

  pub async fn toggle(&mut self) -> Result<()> {
    match self.state {
      PlaybackState::Idle => Ok(()),
      PlaybackState::Ended(i) => self.enter(i, true).await,
      PlaybackState::Playing(i) => {
        let Some(widget) = self.player.instance() else {
          debug!("toggle ignored: no widget instance");
          return Ok(());
        };
        widget.pause().await?;
        self.state = PlaybackState::Paused(i);
        Ok(())
      }
      PlaybackState::Paused(i) => {
        let Some(widget) = self.player.instance() else {
          debug!("toggle ignored: no widget instance");
          return Ok(());
        };
        widget.play().await?;
        self.state = PlaybackState::Playing(i);
        Ok(())
      }
    }
  }

  /// Set the volume, clamped into `0..=100`.
  pub async fn set_volume(&mut self, level: i32) -> Result<()> {
    let clamped = level.clamp(0, 100) as u8;
    if clamped as i32 != level {
      debug!(requested = level, applied = clamped, "volume clamped");
    }
    self.volume = clamped;
    if let Some(widget) = self.player.instance() {
      widget.set_volume(clamped).await?;
    }
    Ok(())
  }

  pub async fn seek(&mut self, secs: f64) -> Result<()> {
    let upper = if self.duration > 0.0 { self.duration } else { f64::MAX };
    let target = secs.clamp(0.0, upper);
    let Some(widget) = self.player.instance() else {
      debug!("seek ignored: no widget instance");
      return Ok(());
    };
    widget.seek_to(target).await?;
    self.position = target;
    Ok(())
  }

  pub async fn apply(&mut self, command: TransportCommand) -> Result<()> {
    match command {
      TransportCommand::Toggle => self.toggle().await,
      TransportCommand::SetVolume(level) => self.set_volume(level).await,
      TransportCommand::VolumeBy(delta) => self.set_volume(self.volume as i32 + delta).await,
      TransportCommand::Seek(secs) => self.seek(secs).await,
      TransportCommand::SeekBy(delta) => self.seek(self.position + delta).await,
      TransportCommand::Next => self.next().await,
      TransportCommand::Previous => self.previous().await,
    }
  }

  pub async fn handle(&mut self, event: PlayerEvent) -> Result<()> {
    match event {
      PlayerEvent::Ready(load) | PlayerEvent::StateChange(load, _) if !self.player.is_current_load(load) => {
        debug!(load, ?event, "dropping event from an earlier load");
        Ok(())
      }
      PlayerEvent::Ready(_) => self.on_ready().await,
      PlayerEvent::StateChange(_, state) => self.on_state_change(state).await,
      PlayerEvent::Tick => self.poll().await,
    }
  }

  async fn on_ready(&mut self) -> Result<()> {
    if self.state == PlaybackState::Idle {
      return Ok(());
    }
    self.player.mark_ready();
    self.poll = Some(PollTimer::spawn(self.poll_period, self.events.clone()));
    let volume = self.volume;
    if let Some(widget) = self.player.instance() {
      widget.set_volume(volume).await?;
    }
    debug!(volume, video_id = self.player.loaded_id().unwrap_or_default(), "widget ready");
    Ok(())
  }

  async fn on_state_change(&mut self, reported: WidgetState) -> Result<()> {
    debug!(?reported, state = ?self.state, "widget state change");
    match (reported, self.state) {
      (WidgetState::Playing, PlaybackState::Paused(i) | PlaybackState::Ended(i)) => {
        self.state = PlaybackState::Playing(i);
      }
      (WidgetState::Paused, PlaybackState::Playing(i)) => {
        self.state = PlaybackState::Paused(i);
      }
      (WidgetState::Ended, PlaybackState::Playing(i)) => {
        if i + 1 < self.playlist.len() {
          info!(index = i + 1, "advancing to next entry");
          self.enter(i + 1, false).await?;
        } else {
          self.state = PlaybackState::Ended(i);
        }
      }
      _ => {}
    }
    Ok(())
  }

  /// Mirror position and duration from the widget while playing.
  async fn poll(&mut self) -> Result<()> {
    if !self.state.is_playing() {
      return Ok(());
    }
    let Some(widget) = self.player.instance() else { return Ok(()) };
    let position = widget.current_time().await;
    let duration = widget.duration().await;
    match position.and_then(|p| duration.map(|d| (p, d))) {
      Ok((position, duration)) => {
        self.position = position;
        self.duration = duration;
      }
      Err(e) => debug!(err = %e, "poll skipped"),
    }
    Ok(())
  }

  /// Dispose the poll timer and tear down the widget.
  pub async fn shutdown(&mut self) -> Result<()> {
    self.poll = None;
    self.player.shutdown().await
  }
}
