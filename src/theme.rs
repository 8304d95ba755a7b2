use ratatui::style::Color;

/// Color palette for the whole screen.
#[derive(Debug)]
pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub static THEMES: [Theme; 3] = [
  Theme {
    name: "Muse",
    bg: Color::Rgb(22, 18, 32),
    fg: Color::Rgb(230, 226, 240),
    accent: Color::Rgb(196, 140, 255),
    muted: Color::Rgb(132, 124, 150),
    border: Color::Rgb(70, 60, 96),
    highlight_fg: Color::Rgb(22, 18, 32),
    highlight_bg: Color::Rgb(196, 140, 255),
    stripe_bg: Color::Rgb(28, 24, 40),
    status: Color::Rgb(130, 210, 200),
    error: Color::Rgb(255, 110, 120),
    key_fg: Color::Rgb(22, 18, 32),
    key_bg: Color::Rgb(132, 124, 150),
  },
  Theme {
    name: "Dusk",
    bg: Color::Rgb(30, 26, 24),
    fg: Color::Rgb(238, 228, 214),
    accent: Color::Rgb(255, 170, 90),
    muted: Color::Rgb(150, 136, 120),
    border: Color::Rgb(90, 76, 64),
    highlight_fg: Color::Rgb(30, 26, 24),
    highlight_bg: Color::Rgb(255, 170, 90),
    stripe_bg: Color::Rgb(36, 32, 29),
    status: Color::Rgb(170, 210, 130),
    error: Color::Rgb(240, 100, 90),
    key_fg: Color::Rgb(30, 26, 24),
    key_bg: Color::Rgb(150, 136, 120),
  },
  Theme {
    name: "Terminal",
    bg: Color::Reset,
    fg: Color::Reset,
    accent: Color::Cyan,
    muted: Color::DarkGray,
    border: Color::Gray,
    highlight_fg: Color::Black,
    highlight_bg: Color::Cyan,
    stripe_bg: Color::Reset,
    status: Color::Green,
    error: Color::Red,
    key_fg: Color::Black,
    key_bg: Color::Gray,
  },
];

/// Index of the theme called `name`, falling back to the first theme.
pub fn theme_index(name: Option<&str>) -> usize {
  name.and_then(|n| THEMES.iter().position(|t| t.name.eq_ignore_ascii_case(n))).unwrap_or(0)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn theme_lookup_is_case_insensitive() {
    assert_eq!(theme_index(Some("dusk")), 1);
    assert_eq!(theme_index(Some("unknown")), 0);
    assert_eq!(theme_index(None), 0);
  }
}
