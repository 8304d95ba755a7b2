use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Flex, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span, Text},
  widgets::{Block, BorderType, Clear, LineGauge, List, ListItem, Padding, Paragraph, Wrap},
};

use crate::app::{App, AppMode};
use crate::search::ResultItem;
use crate::theme::Theme;
use crate::transport::TransportView;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

/// Horizontal scroll that keeps the cursor column inside a field `width` wide.
fn input_scroll(cursor_col: usize, scroll: usize, width: usize) -> usize {
  if cursor_col < scroll {
    cursor_col
  } else if width > 0 && cursor_col >= scroll + width {
    cursor_col + 1 - width
  } else {
    scroll
  }
}

fn panel<'a>(theme: &Theme, title: impl Into<Line<'a>>, focused: bool) -> Block<'a> {
  let color = if focused { theme.accent } else { theme.border };
  Block::bordered()
    .title(title)
    .title_style(Style::default().fg(color).add_modifier(Modifier::BOLD))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(color))
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(6),
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, theme, header_area);
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  render_input(frame, app, input_area);
  render_footer(frame, app, footer_area);

  if let Some(alert) = &app.alert {
    render_alert(frame, theme, alert);
  }
}

fn render_header(frame: &mut Frame, theme: &Theme, area: Rect) {
  let left = Line::from(vec![
    Span::styled(" ♫ muse ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    Span::styled("your music player", Style::default().fg(theme.muted)),
  ]);
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
  let [left, right] = Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(area);

  if app.results.is_empty() {
    render_welcome(frame, app.theme(), left);
  } else {
    render_results(frame, app, left);
  }

  let view = app.transport_view();
  let saved_height = if app.saved_playlists.is_empty() { 0 } else { (app.saved_playlists.len() as u16 + 2).min(8) };
  let [now_area, playlist_area, saved_area] = Layout::vertical([
    Constraint::Length(if view.is_some() { 8 } else { 0 }),
    Constraint::Min(3),
    Constraint::Length(saved_height),
  ])
  .areas(right);

  if let Some(ref view) = view {
    render_now_playing(frame, app.theme(), view, now_area);
  }
  render_playlist(frame, app, playlist_area);
  if saved_height > 0 {
    render_saved_playlists(frame, app, saved_area);
  }
}

fn render_welcome(frame: &mut Frame, theme: &Theme, area: Rect) {
  let text = vec![
    Line::from(""),
    Line::from(Span::styled("♫  Welcome to muse", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled("Search for music. Queue it up. Play.", Style::default().fg(theme.fg))),
    Line::from(""),
    Line::from(Span::styled("Type a query below and press Enter.", Style::default().fg(theme.muted))),
  ];
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(panel(theme, "", false));
  frame.render_widget(paragraph, area);
}

fn render_results(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let focused = app.mode == AppMode::Results;
  // Inner width: area minus 2 borders minus 2 chars for highlight symbol
  let inner_w = area.width.saturating_sub(4) as usize;

  let items: Vec<ListItem> = app
    .results
    .videos
    .iter()
    .enumerate()
    .map(|(i, video)| {
      let item = ResultItem::new(video, app.controller.is_current(&video.id));
      let bg = if i % 2 == 1 { theme.stripe_bg } else { theme.bg };
      let title_style = if item.is_current {
        Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
      } else {
        Style::default().fg(theme.fg)
      };

      let label = item.play_label();
      let title = truncate_str(&item.title, inner_w.saturating_sub(label.chars().count() + 2));
      let label_style = if item.is_current { title_style } else { Style::default().fg(theme.muted) };

      let mut meta = vec![item.channel.clone(), item.duration.clone(), item.views.clone()];
      if let Some(date) = &item.published {
        meta.push(date.clone());
      }
      let meta_line = truncate_str(&meta.join(" · "), inner_w);

      ListItem::new(Text::from(vec![
        Line::from(vec![
          Span::styled(title, title_style),
          Span::raw("  "),
          Span::styled(label, label_style),
        ]),
        Line::from(Span::styled(meta_line, Style::default().fg(theme.muted))),
      ]))
      .bg(bg)
    })
    .collect();

  let title = format!(" Results ({}) ", app.results.videos.len());
  let list = List::new(items)
    .block(panel(theme, title, focused))
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.results.state);
}

fn render_now_playing(frame: &mut Frame, theme: &Theme, view: &TransportView, area: Rect) {
  let block = panel(theme, " Now Playing ", false).padding(Padding::horizontal(1));
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let [title_area, channel_area, _, gauge_area, controls_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Length(1),
    Constraint::Length(1),
    Constraint::Length(1),
    Constraint::Length(1),
  ])
  .areas(inner);

  let width = inner.width as usize;
  frame.render_widget(
    Line::from(Span::styled(truncate_str(&view.title, width), Style::default().fg(theme.fg).bold())),
    title_area,
  );
  frame.render_widget(
    Line::from(Span::styled(truncate_str(&view.channel, width), Style::default().fg(theme.muted))),
    channel_area,
  );

  let gauge = LineGauge::default()
    .ratio(view.progress())
    .label(format!("{} / {}", view.elapsed_label(), view.duration_label()))
    .filled_style(Style::default().fg(theme.accent))
    .unfilled_style(Style::default().fg(theme.border));
  frame.render_widget(gauge, gauge_area);

  let enabled = Style::default().fg(theme.fg).bold();
  let disabled = Style::default().fg(theme.border);
  let controls = Line::from(vec![
    Span::styled("⏮", if view.has_previous { enabled } else { disabled }),
    Span::raw("  "),
    Span::styled(view.toggle_symbol(), Style::default().fg(theme.accent).bold()),
    Span::raw("  "),
    Span::styled("⏭", if view.has_next { enabled } else { disabled }),
    Span::raw("     "),
    Span::styled("🔊 ", Style::default().fg(theme.muted)),
    Span::styled(format!("{:>3}", view.volume), Style::default().fg(theme.fg)),
  ]);
  frame.render_widget(controls, controls_area);
}

fn render_playlist(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let focused = app.mode == AppMode::Playlist;
  let current = app.controller.current_index();
  let inner_w = area.width.saturating_sub(6) as usize;

  let items: Vec<ListItem> = app
    .controller
    .playlist()
    .iter()
    .enumerate()
    .map(|(i, video)| {
      let active = Some(i) == current;
      let style = if active {
        Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
      } else {
        Style::default().fg(theme.fg)
      };
      let line = format!("{:>2}. {}", i + 1, video.title);
      ListItem::new(Line::from(Span::styled(truncate_str(&line, inner_w), style)))
    })
    .collect();

  let count = items.len();
  let title = if count == 1 { " Playlist (1 song) ".to_string() } else { format!(" Playlist ({} songs) ", count) };
  let list = List::new(items)
    .block(panel(theme, title, focused))
    .highlight_symbol(if focused { "▶ " } else { "  " })
    .highlight_style(if focused {
      Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg)
    } else {
      Style::default()
    });
  frame.render_stateful_widget(list, area, &mut app.playlist_state);
}

fn render_saved_playlists(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let inner_w = area.width.saturating_sub(4) as usize;
  let lines: Vec<Line> = app
    .saved_playlists
    .iter()
    .map(|p| {
      let text = format!("{} · {} videos · {}", p.name, p.videos.len(), p.updated_at.format("%Y-%m-%d"));
      Line::from(Span::styled(truncate_str(&text, inner_w), Style::default().fg(theme.muted)))
    })
    .collect();
  frame.render_widget(Paragraph::new(lines).block(panel(theme, " Saved Playlists ", false)), area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if let Some(info) = &app.info_message {
    (format!(" ℹ  {}", info), Style::default().fg(theme.status))
  } else {
    match app.controller.current() {
      Some(video) if app.controller.is_loading() => {
        (format!(" ⏳ Loading {}…", video.title), Style::default().fg(theme.status))
      }
      Some(video) => {
        let state = if app.controller.state().is_playing() { "♪" } else { "‖" };
        (format!(" {} {}", state, video.title), Style::default().fg(theme.status))
      }
      None => (" Ready".to_string(), Style::default().fg(theme.muted)),
    }
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_input(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let focused = app.mode == AppMode::Input;
  let busy = app.search.is_busy();
  let title = format!(" {} ", app.search.button_label());
  let input_block = panel(theme, title, focused && !busy).padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let search = &mut app.search;
  let cursor_col = display_width(&search.input, search.cursor);
  search.scroll = input_scroll(cursor_col, search.scroll, inner_w);

  let scroll = search.scroll;
  let visible: String = search
    .input
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= scroll)
    .take_while(|(start, _, _)| *start < scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let fg = if busy { theme.muted } else { theme.fg };
  let paragraph = Paragraph::new(visible).style(Style::default().fg(fg)).block(input_block);
  frame.render_widget(paragraph, area);

  if focused && !busy && inner_w > 0 {
    let cursor_x = area.x + 2 + cursor_col.saturating_sub(scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let has_results = !app.results.is_empty();
  let has_playlist = !app.controller.playlist().is_empty();
  let keys: Vec<(&str, &str)> = if app.alert.is_some() {
    vec![("any key", "Dismiss")]
  } else {
    match app.mode {
      AppMode::Input => {
        let mut k = vec![("Enter", "Search"), ("^t", "Theme")];
        if has_playlist {
          k.push(("Tab", "Playlist"));
        }
        if has_results {
          k.push(("↓", "Results"));
        } else {
          k.push(("Esc", "Quit"));
        }
        k
      }
      AppMode::Results | AppMode::Playlist => {
        let mut k = if app.mode == AppMode::Results {
          vec![("Enter", "Play"), ("a", "Add"), ("j/k", "Navigate")]
        } else {
          vec![("Enter", "Play"), ("j/k", "Navigate")]
        };
        if app.controller.current().is_some() {
          let label = if app.controller.state().is_playing() { "Pause" } else { "Play" };
          k.push(("Space", label));
          k.push(("n/p", "Next/Prev"));
          k.push(("←/→", "Seek"));
          k.push(("-/+", "Volume"));
        }
        k.push(("Tab", "Switch"));
        k.push(("/", "Search"));
        k
      }
    }
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

/// Centered modal for blocking notifications.
fn render_alert(frame: &mut Frame, theme: &Theme, message: &str) {
  let [area] = Layout::horizontal([Constraint::Percentage(50)]).flex(Flex::Center).areas(frame.area());
  let [area] = Layout::vertical([Constraint::Length(7)]).flex(Flex::Center).areas(area);

  frame.render_widget(Clear, area);
  let block = Block::bordered()
    .title(" Error ")
    .title_style(Style::default().fg(theme.error).add_modifier(Modifier::BOLD))
    .border_type(BorderType::Double)
    .border_style(Style::default().fg(theme.error))
    .style(Style::default().bg(theme.bg))
    .padding(Padding::horizontal(1));
  let paragraph =
    Paragraph::new(message.to_string()).style(Style::default().fg(theme.fg)).wrap(Wrap { trim: true }).block(block);
  frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn truncate_keeps_short_strings() {
    assert_eq!(truncate_str("abc", 5), "abc");
    assert_eq!(truncate_str("abcdef", 4), "abc…");
  }

  #[test]
  fn input_scroll_follows_cursor() {
    assert_eq!(input_scroll(3, 0, 10), 0);
    assert_eq!(input_scroll(12, 0, 10), 3);
    assert_eq!(input_scroll(2, 5, 10), 2);
  }

  #[test]
  fn input_scroll_with_zero_width_field() {
    assert_eq!(input_scroll(5, 0, 0), 0);
    assert_eq!(input_scroll(5, 7, 0), 5);
  }

  #[test]
  fn display_width_counts_wide_chars() {
    assert_eq!(display_width("ab", 2), 2);
    assert_eq!(display_width("日本", 2), 4);
    assert_eq!(display_width("日本", 1), 2);
  }
}
