use crate::controller::Controller;
use crate::format::format_time;

/// Commands the transport controls emit back into the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportCommand {
  Toggle,
  SetVolume(i32),
  /// Relative volume change, resolved against the current level.
  VolumeBy(i32),
  /// Absolute position in seconds.
  Seek(f64),
  /// Relative seek in seconds, resolved against the mirrored position.
  SeekBy(f64),
  Next,
  Previous,
}

/// Snapshot of the controller that the transport controls render.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportView {
  pub title: String,
  pub channel: String,
  pub playing: bool,
  pub position: f64,
  pub duration: f64,
  pub volume: u8,
  pub has_next: bool,
  pub has_previous: bool,
}

impl TransportView {
  /// `None` while nothing is loaded; the controls are hidden then.
  pub fn from_controller(c: &Controller) -> Option<Self> {
    let current = c.current()?;
    Some(Self {
      title: current.title.clone(),
      channel: current.channel_title.clone(),
      playing: c.state().is_playing(),
      position: c.position(),
      duration: c.duration(),
      volume: c.volume(),
      has_next: c.has_next(),
      has_previous: c.has_previous(),
    })
  }

  pub fn elapsed_label(&self) -> String {
    format_time(self.position)
  }

  pub fn duration_label(&self) -> String {
    format_time(self.duration)
  }

  /// Fraction of the track played, for the progress gauge.
  pub fn progress(&self) -> f64 {
    if self.duration > 0.0 { (self.position / self.duration).clamp(0.0, 1.0) } else { 0.0 }
  }

  pub fn toggle_symbol(&self) -> &'static str {
    if self.playing { "⏸" } else { "▶" }
  }

  /// Whether the control for `command` is enabled. Disabled commands are not sent.
  pub fn allows(&self, command: TransportCommand) -> bool {
    match command {
      TransportCommand::Next => self.has_next,
      TransportCommand::Previous => self.has_previous,
      _ => true,
    }
  }
}
