use anyhow::Result;
use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::{App, AppMode};
use crate::constants::constants;
use crate::transport::TransportCommand;

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

/// Transport bindings shared by the results and playlist panes.
fn transport_command(code: KeyCode) -> Option<TransportCommand> {
  let c = constants();
  match code {
    KeyCode::Char(' ') => Some(TransportCommand::Toggle),
    KeyCode::Char('n') => Some(TransportCommand::Next),
    KeyCode::Char('p') => Some(TransportCommand::Previous),
    KeyCode::Char('+') | KeyCode::Char('=') => Some(TransportCommand::VolumeBy(c.volume_step)),
    KeyCode::Char('-') => Some(TransportCommand::VolumeBy(-c.volume_step)),
    KeyCode::Right | KeyCode::Char('l') => Some(TransportCommand::SeekBy(c.seek_step_secs)),
    KeyCode::Left | KeyCode::Char('h') => Some(TransportCommand::SeekBy(-c.seek_step_secs)),
    KeyCode::Char('0') => Some(TransportCommand::Seek(0.0)),
    KeyCode::Char('m') => Some(TransportCommand::SetVolume(0)),
    _ => None,
  }
}

// --- Event Handling ---

pub async fn handle_key_event(app: &mut App, key: event::KeyEvent) -> Result<()> {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return Ok(());
  }

  // A pending alert swallows the key that dismisses it.
  if app.alert.is_some() {
    app.dismiss_alert();
    return Ok(());
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
    app.next_theme();
    return Ok(());
  }

  match app.mode {
    AppMode::Input => handle_input_key(app, key),
    AppMode::Results => handle_results_key(app, key).await,
    AppMode::Playlist => handle_playlist_key(app, key).await,
  }
  Ok(())
}

fn handle_input_key(app: &mut App, key: event::KeyEvent) {
  app.clear_error();
  let busy = app.search.is_busy();
  let panel = &mut app.search;
  match key.code {
    KeyCode::Enter => {
      app.trigger_search();
    }
    KeyCode::Char(c) if !busy => {
      let byte_idx = char_to_byte_index(&panel.input, panel.cursor);
      panel.input.insert(byte_idx, c);
      panel.cursor += 1;
    }
    KeyCode::Backspace if !busy => {
      if panel.cursor > 0 {
        panel.cursor -= 1;
        let byte_idx = char_to_byte_index(&panel.input, panel.cursor);
        panel.input.remove(byte_idx);
      }
    }
    KeyCode::Delete if !busy => {
      if panel.cursor < panel.input.chars().count() {
        let byte_idx = char_to_byte_index(&panel.input, panel.cursor);
        panel.input.remove(byte_idx);
      }
    }
    KeyCode::Left => {
      panel.cursor = panel.cursor.saturating_sub(1);
    }
    KeyCode::Right => {
      if panel.cursor < panel.input.chars().count() {
        panel.cursor += 1;
      }
    }
    KeyCode::Home => {
      panel.cursor = 0;
    }
    KeyCode::End => {
      panel.cursor = panel.input.chars().count();
    }
    KeyCode::Esc => {
      if !panel.input.is_empty() && !busy {
        panel.clear();
      } else if !app.results.is_empty() {
        app.mode = AppMode::Results;
      } else if !busy {
        app.should_quit = true;
      }
    }
    KeyCode::Down => {
      if !app.results.is_empty() {
        app.mode = AppMode::Results;
      }
    }
    KeyCode::Tab => {
      if !app.controller.playlist().is_empty() {
        app.mode = AppMode::Playlist;
      }
    }
    _ => {}
  }
}

async fn handle_results_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Enter => {
      app.play_selected().await;
    }
    KeyCode::Char('a') => {
      app.add_selected();
    }
    KeyCode::Down | KeyCode::Char('j') => {
      app.results.select_next();
    }
    KeyCode::Up | KeyCode::Char('k') => {
      app.results.select_previous();
    }
    KeyCode::Tab => {
      if !app.controller.playlist().is_empty() {
        app.mode = AppMode::Playlist;
      }
    }
    KeyCode::Esc | KeyCode::Char('/') => {
      app.mode = AppMode::Input;
    }
    code => {
      if let Some(command) = transport_command(code) {
        app.transport(command).await;
      }
    }
  }
}

async fn handle_playlist_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Enter => {
      app.jump_to_selected().await;
    }
    KeyCode::Down | KeyCode::Char('j') => {
      app.select_playlist_entry(true);
    }
    KeyCode::Up | KeyCode::Char('k') => {
      app.select_playlist_entry(false);
    }
    KeyCode::Tab | KeyCode::Esc => {
      app.mode = if app.results.is_empty() { AppMode::Input } else { AppMode::Results };
    }
    KeyCode::Char('/') => {
      app.mode = AppMode::Input;
    }
    code => {
      if let Some(command) = transport_command(code) {
        app.transport(command).await;
      }
    }
  }
}
