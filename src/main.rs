mod api;
mod app;
mod config;
mod constants;
mod controller;
mod format;
mod input;
mod logging;
mod mpv;
mod player;
mod search;
mod theme;
mod transport;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

use api::ApiClient;
use app::App;
use config::{Config, Overrides};
use mpv::MpvWidget;
use player::{EmbeddedPlayer, LoadOptions};

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Base URL of the catalog backend (e.g. http://localhost:8001)
  #[arg(long, env = "MUSE_API_URL")]
  api_url: Option<String>,

  /// Initial volume, 0-100
  #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
  volume: Option<u8>,

  /// Open a video window instead of playing audio only
  #[arg(long)]
  video: bool,

  /// Print shell completions and exit
  #[arg(long, value_name = "SHELL")]
  completions: Option<Shell>,
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(shell) = args.completions {
    clap_complete::generate(shell, &mut Args::command(), "muse", &mut std::io::stdout());
    return Ok(());
  }

  let _log_guard = logging::init()?;

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, args).await;
  ratatui::restore();
  if let Err(ref e) = result {
    error!(err = %format!("{:#}", e), "exiting with error");
  }
  result
}

async fn run(terminal: &mut DefaultTerminal, args: Args) -> Result<()> {
  let config = Config::load();
  let settings = config.resolve(&Overrides { api_url: args.api_url, volume: args.volume, video: args.video });
  info!(api_url = %settings.api_url, volume = settings.volume, audio_only = settings.audio_only, "starting");

  let (player_tx, player_rx) = mpsc::unbounded_channel();
  let widget = MpvWidget::new(player_tx.clone());
  let player = EmbeddedPlayer::new(
    Box::new(widget),
    LoadOptions { audio_only: settings.audio_only, ..LoadOptions::default() },
  );
  let catalog = Arc::new(ApiClient::new(&settings.api_url));

  let mut app = App::new(catalog, player, config, &settings, player_tx, player_rx);
  app.load_playlists();

  loop {
    app.check_pending().await?;
    app.expire_messages();

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key).await?;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  app.shutdown().await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cli_parses_overrides() {
    let args = Args::try_parse_from(["muse", "--api-url", "http://x", "--volume", "30", "--video"]).unwrap();
    assert_eq!(args.api_url.as_deref(), Some("http://x"));
    assert_eq!(args.volume, Some(30));
    assert!(args.video);
  }

  #[test]
  fn cli_rejects_out_of_range_volume() {
    assert!(Args::try_parse_from(["muse", "--volume", "150"]).is_err());
  }

  #[test]
  fn cli_definition_is_valid() {
    Args::command().debug_assert();
  }
}
