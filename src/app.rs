use anyhow::Result;
use ratatui::widgets::ListState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::api::{Catalog, SavedPlaylist, Video};
use crate::config::{Config, Settings};
use crate::constants::constants;
use crate::controller::Controller;
use crate::player::{EmbeddedPlayer, PlayerEvent};
use crate::search::{ResultList, SearchPanel};
use crate::theme::{THEMES, Theme, theme_index};
use crate::transport::{TransportCommand, TransportView};

// --- Types ---

/// A completed search: the query it was issued for and its outcome.
pub type SearchResponse = (String, Result<Vec<Video>>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Input,
  Results,
  Playlist,
}

/// Channels that background tasks report back on.
pub(crate) struct AsyncTasks {
  /// Every search sends its response here; responses are applied in arrival order.
  pub(crate) search_tx: mpsc::UnboundedSender<SearchResponse>,
  pub(crate) search_rx: mpsc::UnboundedReceiver<SearchResponse>,
  pub(crate) playlists_rx: Option<oneshot::Receiver<Result<Vec<SavedPlaylist>>>>,
  pub(crate) player_rx: mpsc::UnboundedReceiver<PlayerEvent>,
}

pub struct App {
  pub search: SearchPanel,
  pub results: ResultList,
  pub mode: AppMode,
  pub controller: Controller,
  /// Selection within the current playlist panel.
  pub playlist_state: ListState,
  /// Playlists stored by the backend, fetched once at startup.
  pub saved_playlists: Vec<SavedPlaylist>,
  pub theme_index: usize,
  /// Blocking notification; must be dismissed before anything else happens.
  pub alert: Option<String>,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  /// Informational message, lower priority than status/error.
  pub info_message: Option<String>,
  pub should_quit: bool,
  catalog: Arc<dyn Catalog>,
  pub(crate) tasks: AsyncTasks,
  config: Config,
  error_time: Option<Instant>,
  info_time: Option<Instant>,
}

impl App {
  pub fn new(
    catalog: Arc<dyn Catalog>,
    player: EmbeddedPlayer,
    config: Config,
    settings: &Settings,
    player_tx: mpsc::UnboundedSender<PlayerEvent>,
    player_rx: mpsc::UnboundedReceiver<PlayerEvent>,
  ) -> Self {
    let poll_period = Duration::from_millis(constants().poll_interval_ms);
    let (search_tx, search_rx) = mpsc::unbounded_channel();
    Self {
      search: SearchPanel::default(),
      results: ResultList::default(),
      mode: AppMode::Input,
      controller: Controller::new(player, settings.volume, poll_period, player_tx),
      playlist_state: ListState::default(),
      saved_playlists: Vec::new(),
      theme_index: theme_index(settings.theme_name.as_deref()),
      alert: None,
      last_error: None,
      status_message: None,
      info_message: None,
      should_quit: false,
      catalog,
      tasks: AsyncTasks { search_tx, search_rx, playlists_rx: None, player_rx },
      config,
      error_time: None,
      info_time: None,
    }
  }

  pub fn theme(&self) -> &'static Theme {
    // Safety: theme_index is bounded by theme_index() and the modulo in next_theme().
    &THEMES[self.theme_index]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.config.theme_name = Some(self.theme().name.to_string());
    self.config.save();
  }

  // --- Messages ---

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  pub fn set_info(&mut self, msg: String) {
    self.info_message = Some(msg);
    self.info_time = Some(Instant::now());
  }

  /// Clear stale error and info messages.
  pub fn expire_messages(&mut self) {
    let ttl = Duration::from_secs(constants().message_ttl_secs);
    if let Some(t) = self.error_time
      && t.elapsed() >= ttl
    {
      self.clear_error();
    }
    if let Some(t) = self.info_time
      && t.elapsed() >= ttl
    {
      self.info_message = None;
      self.info_time = None;
    }
  }

  pub fn dismiss_alert(&mut self) {
    self.alert = None;
  }

  // --- Background results ---

  pub async fn check_pending(&mut self) -> Result<()> {
    while let Ok(response) = self.tasks.search_rx.try_recv() {
      self.apply_search_response(response);
    }

    if let Some(mut rx) = self.tasks.playlists_rx.take() {
      match rx.try_recv() {
        Ok(result) => self.apply_playlists(result),
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.playlists_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          warn!("playlist listing task dropped");
        }
      }
    }

    while let Ok(event) = self.tasks.player_rx.try_recv() {
      self.handle_player_event(event).await;
    }

    Ok(())
  }

  pub(crate) async fn handle_player_event(&mut self, event: PlayerEvent) {
    if let Err(e) = self.controller.handle(event).await {
      error!(err = %e, ?event, "player event failed");
      self.set_error(format!("Player error: {:#}", e));
    }
  }

  // --- Search ---

  pub fn trigger_search(&mut self) {
    if self.search.is_busy() {
      return;
    }
    let Some(query) = self.search.submit() else {
      self.set_error("Enter a search term.".to_string());
      return;
    };
    info!(query = %query, "search triggered");
    self.clear_error();
    self.status_message = Some(format!("Searching '{}'…", query));
    self.spawn_search(query);
  }

  /// Issue the backend call. Nothing cancels or orders in-flight searches.
  pub(crate) fn spawn_search(&self, query: String) {
    let catalog = Arc::clone(&self.catalog);
    let tx = self.tasks.search_tx.clone();
    let max_results = constants().max_results;
    tokio::spawn(async move {
      let result = catalog.search(&query, max_results).await;
      let _ = tx.send((query, result));
    });
  }

  pub(crate) fn apply_search_response(&mut self, (query, result): SearchResponse) {
    self.search.finish();
    self.status_message = None;
    match result {
      Ok(videos) => {
        info!(query = %query, count = videos.len(), "search results");
        if videos.is_empty() {
          self.set_info("No results found.".to_string());
        }
        self.results.replace(videos);
        if !self.results.is_empty() {
          self.mode = AppMode::Results;
        }
      }
      Err(e) => {
        error!(query = %query, err = %e, "search failed");
        self.alert = Some(format!("Search failed: {:#}\n\nPlease try again.", e));
      }
    }
  }

  // --- Saved playlists ---

  pub fn load_playlists(&mut self) {
    let catalog = Arc::clone(&self.catalog);
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(catalog.playlists().await);
    });
    self.tasks.playlists_rx = Some(rx);
  }

  fn apply_playlists(&mut self, result: Result<Vec<SavedPlaylist>>) {
    match result {
      Ok(playlists) => {
        info!(count = playlists.len(), "saved playlists loaded");
        self.saved_playlists = playlists;
      }
      Err(e) => warn!(err = %format!("{:#}", e), "failed to load playlists"),
    }
  }

  // --- Playback ---

  pub async fn play_selected(&mut self) {
    let Some(video) = self.results.selected().cloned() else { return };
    self.clear_error();
    if let Err(e) = self.controller.play(video).await {
      self.set_error(format!("Playback error: {:#}", e));
    }
    self.playlist_state.select(Some(0));
  }

  pub fn add_selected(&mut self) {
    let Some(video) = self.results.selected().cloned() else { return };
    let title = video.title.clone();
    self.controller.add(video);
    self.set_info(format!("Added \"{}\" to current playlist", title));
  }

  /// Play the playlist entry highlighted in the playlist panel.
  pub async fn jump_to_selected(&mut self) {
    let Some(index) = self.playlist_state.selected() else { return };
    if let Err(e) = self.controller.jump_to(index).await {
      self.set_error(format!("Playback error: {:#}", e));
    }
  }

  pub fn select_playlist_entry(&mut self, forward: bool) {
    let count = self.controller.playlist().len();
    if count == 0 {
      return;
    }
    let i = match (self.playlist_state.selected(), forward) {
      (None, _) => 0,
      (Some(i), true) => (i + 1) % count,
      (Some(0), false) => count - 1,
      (Some(i), false) => i - 1,
    };
    self.playlist_state.select(Some(i));
  }

  pub fn transport_view(&self) -> Option<TransportView> {
    TransportView::from_controller(&self.controller)
  }

  /// Forward a transport command, unless its control is disabled.
  pub async fn transport(&mut self, command: TransportCommand) {
    let Some(view) = self.transport_view() else { return };
    if !view.allows(command) {
      return;
    }
    if let Err(e) = self.controller.apply(command).await {
      self.set_error(format!("Player error: {:#}", e));
      return;
    }
    if matches!(command, TransportCommand::SetVolume(_) | TransportCommand::VolumeBy(_)) {
      self.config.volume = Some(self.controller.volume());
      self.config.save();
    }
    if matches!(command, TransportCommand::Next | TransportCommand::Previous) {
      self.playlist_state.select(self.controller.current_index());
    }
  }

  pub async fn shutdown(&mut self) -> Result<()> {
    self.controller.shutdown().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Overrides;
  use crate::controller::tests::video;
  use crate::player::LoadOptions;
  use crate::player::testing::FakeWidget;
  use anyhow::anyhow;
  use async_trait::async_trait;
  use std::collections::HashMap;
  use std::sync::Mutex;

  /// Catalog whose searches block until the test releases them.
  #[derive(Default)]
  struct GatedCatalog {
    gates: Mutex<HashMap<String, oneshot::Receiver<Result<Vec<Video>>>>>,
    /// `max_results` of every search, in call order.
    limits: Mutex<Vec<usize>>,
  }

  impl GatedCatalog {
    fn gate(&self, query: &str) -> oneshot::Sender<Result<Vec<Video>>> {
      let (tx, rx) = oneshot::channel();
      self.gates.lock().unwrap().insert(query.to_string(), rx);
      tx
    }
  }

  #[async_trait]
  impl Catalog for GatedCatalog {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Video>> {
      self.limits.lock().unwrap().push(max_results);
      let rx = self.gates.lock().unwrap().remove(query).ok_or_else(|| anyhow!("no gate for {}", query))?;
      rx.await.map_err(|_| anyhow!("gate dropped"))?
    }

    async fn playlists(&self) -> Result<Vec<SavedPlaylist>> {
      Err(anyhow!("connection refused"))
    }
  }

  fn app_with(catalog: Arc<dyn Catalog>) -> App {
    let (tx, rx) = mpsc::unbounded_channel();
    let player = EmbeddedPlayer::new(Box::new(FakeWidget::default()), LoadOptions::default());
    let settings = Config::default().resolve(&Overrides::default());
    App::new(catalog, player, Config::default(), &settings, tx, rx)
  }

  async fn recv_search(app: &mut App) {
    let response = app.tasks.search_rx.recv().await.unwrap();
    app.apply_search_response(response);
  }

  fn result_ids(app: &App) -> Vec<&str> {
    app.results.videos.iter().map(|v| v.id.as_str()).collect()
  }

  #[tokio::test]
  async fn late_response_overwrites_newer_results() {
    let catalog = Arc::new(GatedCatalog::default());
    let first = catalog.gate("first");
    let second = catalog.gate("second");
    let mut app = app_with(catalog.clone());

    app.spawn_search("first".into());
    app.spawn_search("second".into());

    second.send(Ok(vec![video("b")])).unwrap();
    recv_search(&mut app).await;
    assert_eq!(result_ids(&app), vec!["b"]);

    first.send(Ok(vec![video("a")])).unwrap();
    recv_search(&mut app).await;
    assert_eq!(result_ids(&app), vec!["a"], "the stale response wins because it arrived last");
  }

  #[tokio::test]
  async fn search_failure_keeps_results_and_raises_alert() {
    let catalog = Arc::new(GatedCatalog::default());
    let ok = catalog.gate("ok");
    let bad = catalog.gate("bad");
    let mut app = app_with(catalog.clone());

    app.search.input = "ok".into();
    app.trigger_search();
    assert!(app.search.is_busy());
    ok.send(Ok(vec![video("a"), video("b")])).unwrap();
    recv_search(&mut app).await;
    assert!(!app.search.is_busy());
    assert_eq!(app.mode, AppMode::Results);

    app.search.input = "bad".into();
    app.trigger_search();
    bad.send(Err(anyhow!("429: YouTube API quota exceeded"))).unwrap();
    recv_search(&mut app).await;
    assert_eq!(result_ids(&app), vec!["a", "b"]);
    assert!(app.alert.as_deref().is_some_and(|a| a.contains("quota exceeded")));
    assert!(!app.search.is_busy());
  }

  #[tokio::test]
  async fn searches_ask_for_twenty_results() {
    let catalog = Arc::new(GatedCatalog::default());
    let gate = catalog.gate("lofi");
    let mut app = app_with(catalog.clone());
    app.search.input = "lofi".into();
    app.trigger_search();
    gate.send(Ok(vec![video("a")])).unwrap();
    recv_search(&mut app).await;
    assert_eq!(*catalog.limits.lock().unwrap(), vec![20]);
  }

  #[tokio::test]
  async fn busy_panel_ignores_submission() {
    let catalog = Arc::new(GatedCatalog::default());
    let _pending = catalog.gate("one");
    let mut app = app_with(catalog.clone());
    app.search.input = "one".into();
    app.trigger_search();
    app.search.input = "two".into();
    app.trigger_search();
    assert!(app.last_error.is_none());
    assert_eq!(app.status_message.as_deref(), Some("Searching 'one'…"));
  }

  #[tokio::test]
  async fn blank_query_sets_error() {
    let mut app = app_with(Arc::new(GatedCatalog::default()));
    app.search.input = "  ".into();
    app.trigger_search();
    assert_eq!(app.last_error.as_deref(), Some("Enter a search term."));
    assert!(!app.search.is_busy());
  }

  #[tokio::test]
  async fn empty_results_replace_and_inform() {
    let catalog = Arc::new(GatedCatalog::default());
    let mut app = app_with(catalog.clone());
    app.results.replace(vec![video("a")]);
    app.apply_search_response(("nothing".into(), Ok(Vec::new())));
    assert!(app.results.is_empty());
    assert_eq!(app.info_message.as_deref(), Some("No results found."));
  }

  #[tokio::test]
  async fn playlist_listing_failure_is_silent() {
    let mut app = app_with(Arc::new(GatedCatalog::default()));
    app.load_playlists();
    let rx = app.tasks.playlists_rx.take().unwrap();
    app.apply_playlists(rx.await.unwrap());
    assert!(app.saved_playlists.is_empty());
    assert!(app.alert.is_none());
    assert!(app.last_error.is_none());
  }

  #[tokio::test]
  async fn play_and_add_from_results() {
    let mut app = app_with(Arc::new(GatedCatalog::default()));
    app.results.replace(vec![video("a"), video("b"), video("c")]);
    app.play_selected().await;
    app.results.select_next();
    app.add_selected();
    assert_eq!(app.info_message.as_deref(), Some("Added \"Title b\" to current playlist"));

    let ids: Vec<&str> = app.controller.playlist().iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert!(app.controller.is_current("a"));

    app.results.select_next();
    app.play_selected().await;
    let ids: Vec<&str> = app.controller.playlist().iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["c"]);
  }

  #[tokio::test]
  async fn disabled_transport_commands_are_dropped() {
    let mut app = app_with(Arc::new(GatedCatalog::default()));
    app.transport(TransportCommand::Next).await;
    app.results.replace(vec![video("a")]);
    app.play_selected().await;
    app.transport(TransportCommand::Next).await;
    app.transport(TransportCommand::Previous).await;
    assert_eq!(app.controller.current_index(), Some(0));
    assert!(app.last_error.is_none());
  }

  #[tokio::test]
  async fn playlist_panel_selection_wraps() {
    let mut app = app_with(Arc::new(GatedCatalog::default()));
    app.results.replace(vec![video("a"), video("b")]);
    app.play_selected().await;
    app.results.select_next();
    app.add_selected();
    app.select_playlist_entry(false);
    assert_eq!(app.playlist_state.selected(), Some(1));
    app.jump_to_selected().await;
    assert!(app.controller.is_current("b"));
  }
}
