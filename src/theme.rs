use std::sync::OnceLock;

use ratatui::style::{Color, Modifier, Style};
use serde::Deserialize;

static THEME: OnceLock<Theme> = OnceLock::new();

/// The active theme. Falls back to the default if `install` was never called.
pub fn current() -> &'static Theme {
    THEME.get_or_init(Theme::default)
}

/// Set the theme once at startup. Later calls are ignored.
pub fn install(config: &ThemeConfig) {
    let _ = THEME.set(config.to_theme());
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub dim: Style,
    pub border: Style,
    pub today: Style,
    pub event: Style,
    pub holiday: Style,
    pub pulse: Style,
    pub card: Style,
    pub status: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header: Style::new().fg(Color::White).add_modifier(Modifier::BOLD),
            dim: Style::new().fg(Color::DarkGray),
            border: Style::new().fg(Color::Gray),
            today: Style::new().fg(Color::Black).bg(Color::Yellow),
            event: Style::new().fg(Color::LightRed),
            holiday: Style::new().fg(Color::LightBlue).add_modifier(Modifier::ITALIC),
            pulse: Style::new()
                .fg(Color::Black)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
            card: Style::new().fg(Color::Red),
            status: Style::new().fg(Color::White).bg(Color::DarkGray),
        }
    }
}

impl Theme {
    pub fn preset(name: &str) -> Self {
        match name {
            "high-contrast" => Self::high_contrast(),
            "campus" => Self::campus(),
            _ => Self::default(),
        }
    }

    fn high_contrast() -> Self {
        Self {
            header: Style::new().fg(Color::White).add_modifier(Modifier::BOLD),
            dim: Style::new().fg(Color::Gray),
            border: Style::new().fg(Color::White),
            today: Style::new().fg(Color::Black).bg(Color::White),
            event: Style::new().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            holiday: Style::new().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            pulse: Style::new()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
            card: Style::new().fg(Color::Yellow),
            status: Style::new().fg(Color::Black).bg(Color::White),
        }
    }

    fn campus() -> Self {
        let red = Color::Rgb(210, 32, 39);
        Self {
            header: Style::new().fg(Color::Rgb(245, 245, 245)).add_modifier(Modifier::BOLD),
            dim: Style::new().fg(Color::Rgb(140, 140, 140)),
            border: Style::new().fg(Color::Rgb(90, 90, 90)),
            today: Style::new().fg(Color::Black).bg(Color::Rgb(250, 189, 47)),
            event: Style::new().fg(red),
            holiday: Style::new().fg(Color::Rgb(131, 165, 152)).add_modifier(Modifier::ITALIC),
            pulse: Style::new()
                .fg(Color::White)
                .bg(red)
                .add_modifier(Modifier::BOLD),
            card: Style::new().fg(red),
            status: Style::new().fg(Color::Rgb(245, 245, 245)).bg(Color::Rgb(60, 60, 60)),
        }
    }
}

/// `[display.theme]` in config.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub preset: Option<String>,
    pub event_fg: Option<String>,
    pub holiday_fg: Option<String>,
    pub pulse_bg: Option<String>,
    pub today_bg: Option<String>,
    pub card_fg: Option<String>,
}

impl ThemeConfig {
    pub fn to_theme(&self) -> Theme {
        let mut theme = self
            .preset
            .as_deref()
            .map(Theme::preset)
            .unwrap_or_default();

        if let Some(c) = self.event_fg.as_deref().and_then(parse_color) {
            theme.event = theme.event.fg(c);
        }
        if let Some(c) = self.holiday_fg.as_deref().and_then(parse_color) {
            theme.holiday = theme.holiday.fg(c);
        }
        if let Some(c) = self.pulse_bg.as_deref().and_then(parse_color) {
            theme.pulse = theme.pulse.bg(c);
        }
        if let Some(c) = self.today_bg.as_deref().and_then(parse_color) {
            theme.today = theme.today.bg(c);
        }
        if let Some(c) = self.card_fg.as_deref().and_then(parse_color) {
            theme.card = theme.card.fg(c);
        }
        theme
    }
}

/// Hex "#rrggbb" or a basic color name.
fn parse_color(s: &str) -> Option<Color> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#').filter(|h| h.len() == 6) {
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        return Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?));
    }
    match s.to_lowercase().as_str() {
        "black" => Some(Color::Black),
        "red" => Some(Color::Red),
        "green" => Some(Color::Green),
        "yellow" => Some(Color::Yellow),
        "blue" => Some(Color::Blue),
        "magenta" => Some(Color::Magenta),
        "cyan" => Some(Color::Cyan),
        "white" => Some(Color::White),
        "gray" | "grey" => Some(Color::Gray),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_parse() {
        assert_eq!(parse_color("#d22027"), Some(Color::Rgb(210, 32, 39)));
        assert_eq!(parse_color(" Cyan "), Some(Color::Cyan));
        assert_eq!(parse_color("#12"), None);
        assert_eq!(parse_color("#zzzzzz"), None);
        assert_eq!(parse_color("mauve"), None);
    }

    #[test]
    fn overrides_apply_on_top_of_preset() {
        let config = ThemeConfig {
            preset: Some("high-contrast".into()),
            pulse_bg: Some("#000080".into()),
            ..Default::default()
        };
        let theme = config.to_theme();
        assert_eq!(theme.pulse.bg, Some(Color::Rgb(0, 0, 128)));
        assert_eq!(theme.event.fg, Some(Color::Yellow));
    }
}
