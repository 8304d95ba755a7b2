use ratatui::widgets::ListState;

use crate::api::Video;
use crate::format::{format_duration, format_published, format_view_count, parse_view_count};

/// Query input with a busy flag for the in-flight search.
#[derive(Debug, Default)]
pub struct SearchPanel {
  pub input: String,
  /// Cursor position within `input` (char index).
  pub cursor: usize,
  /// Horizontal scroll offset for rendering.
  pub scroll: usize,
  busy: bool,
}

impl SearchPanel {
  pub fn is_busy(&self) -> bool {
    self.busy
  }

  pub fn can_submit(&self) -> bool {
    !self.busy && !self.input.trim().is_empty()
  }

  /// Take the trimmed query and mark the panel busy. `None` while a search is
  /// in flight or the query is blank.
  pub fn submit(&mut self) -> Option<String> {
    if !self.can_submit() {
      return None;
    }
    self.busy = true;
    Some(self.input.trim().to_string())
  }

  /// Re-enable input after a search completes, successfully or not.
  pub fn finish(&mut self) {
    self.busy = false;
  }

  pub fn button_label(&self) -> &'static str {
    if self.busy { "Searching…" } else { "Search" }
  }

  pub fn clear(&mut self) {
    self.input.clear();
    self.cursor = 0;
    self.scroll = 0;
  }
}

/// Display strings for one search result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultItem {
  pub title: String,
  pub channel: String,
  /// Formatted duration, or the raw code when it does not parse.
  pub duration: String,
  pub views: String,
  pub published: Option<String>,
  pub is_current: bool,
}

impl ResultItem {
  pub fn new(video: &Video, is_current: bool) -> Self {
    Self {
      title: video.title.clone(),
      channel: video.channel_title.clone(),
      duration: format_duration(&video.duration).unwrap_or_else(|_| video.duration.clone()),
      views: format_view_count(parse_view_count(&video.view_count)),
      published: format_published(&video.published_at),
      is_current,
    }
  }

  pub fn play_label(&self) -> &'static str {
    if self.is_current { "▶ Playing" } else { "▶ Play" }
  }
}

/// The current result set and its selection.
#[derive(Debug, Default)]
pub struct ResultList {
  pub videos: Vec<Video>,
  pub state: ListState,
}

impl ResultList {
  pub fn is_empty(&self) -> bool {
    self.videos.is_empty()
  }

  /// Replace the result set wholesale.
  pub fn replace(&mut self, videos: Vec<Video>) {
    self.videos = videos;
    self.state.select(if self.videos.is_empty() { None } else { Some(0) });
  }

  pub fn selected(&self) -> Option<&Video> {
    self.state.selected().and_then(|i| self.videos.get(i))
  }

  pub fn select_next(&mut self) {
    let count = self.videos.len();
    if count > 0 {
      let i = self.state.selected().map_or(0, |i| (i + 1) % count);
      self.state.select(Some(i));
    }
  }

  pub fn select_previous(&mut self) {
    let count = self.videos.len();
    if count > 0 {
      let i = self.state.selected().map_or(0, |i| if i == 0 { count - 1 } else { i - 1 });
      self.state.select(Some(i));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::controller::tests::video;

  #[test]
  fn submit_requires_non_blank_query() {
    let mut panel = SearchPanel { input: "   ".into(), ..SearchPanel::default() };
    assert!(panel.submit().is_none());
    assert!(!panel.is_busy());
  }

  #[test]
  fn submit_trims_and_blocks_until_finished() {
    let mut panel = SearchPanel { input: "  lofi beats ".into(), ..SearchPanel::default() };
    assert_eq!(panel.submit().as_deref(), Some("lofi beats"));
    assert!(panel.is_busy());
    assert_eq!(panel.button_label(), "Searching…");
    assert!(panel.submit().is_none());
    panel.finish();
    assert_eq!(panel.button_label(), "Search");
    assert!(panel.submit().is_some());
  }

  #[test]
  fn result_item_formats_metadata() {
    let mut v = video("a");
    v.duration = "PT1H2M3S".into();
    v.view_count = "2500000".into();
    let item = ResultItem::new(&v, true);
    assert_eq!(item.duration, "1:02:03");
    assert_eq!(item.views, "2.5M views");
    assert_eq!(item.published.as_deref(), Some("2024-01-01"));
    assert_eq!(item.play_label(), "▶ Playing");
  }

  #[test]
  fn result_item_keeps_raw_code_for_malformed_duration() {
    let mut v = video("a");
    v.duration = "P0D".into();
    let item = ResultItem::new(&v, false);
    assert_eq!(item.duration, "P0D");
    assert_eq!(item.play_label(), "▶ Play");
  }

  #[test]
  fn replace_resets_selection() {
    let mut list = ResultList::default();
    list.replace(vec![video("a"), video("b")]);
    list.select_next();
    assert_eq!(list.selected().map(|v| v.id.as_str()), Some("b"));
    list.replace(vec![video("c")]);
    assert_eq!(list.selected().map(|v| v.id.as_str()), Some("c"));
    list.replace(Vec::new());
    assert!(list.selected().is_none());
  }

  #[test]
  fn selection_wraps() {
    let mut list = ResultList::default();
    list.replace(vec![video("a"), video("b"), video("c")]);
    list.select_previous();
    assert_eq!(list.state.selected(), Some(2));
    list.select_next();
    assert_eq!(list.state.selected(), Some(0));
  }
}
