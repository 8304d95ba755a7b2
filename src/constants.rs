//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!`, so there is no runtime file
//! I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Backend
  pub default_api_url: String,
  /// Result-count ceiling sent with every search.
  pub max_results: usize,

  // Player widget
  pub player_width: u32,
  pub player_height: u32,
  pub default_volume: u8,
  pub poll_interval_ms: u64,
  pub mpv_connect_attempts: u32,

  // Key bindings
  pub seek_step_secs: f64,
  pub volume_step: i32,

  // Status line
  pub message_ttl_secs: u64,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is caught by the test below.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn embedded_constants_parse() {
    let c = constants();
    assert_eq!(c.max_results, 20);
    assert_eq!(c.poll_interval_ms, 1000);
    assert!(c.default_volume <= 100);
  }
}
