//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// One Dark palette and board colours loaded from a theme file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// Tile group colours, cycled when there are more groups than entries.
    pub groups: [Color; 6],
    /// Player 1 token.
    pub token_a: Color,
    /// Player 2 token.
    pub token_b: Color,
    /// Marker drawn on the two hinted tiles.
    pub hint: Color,
    /// Item glyphs.
    pub item: Color,
    /// Connection lines after a match.
    pub connection: Color,
    /// Board background.
    pub bg: Color,
    /// Grid / border.
    pub div_line: Color,
    /// Text (scores, time).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Secondary text and unselected menu entries.
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

const GREEN: Color = Color::Rgb(0x98, 0xC3, 0x79);
const YELLOW: Color = Color::Rgb(0xE5, 0xC0, 0x7B);
const RED: Color = Color::Rgb(0xE0, 0x6C, 0x75);
const BLUE: Color = Color::Rgb(0x61, 0xAF, 0xEF);
const MAGENTA: Color = Color::Rgb(0xC6, 0x78, 0xDD);
const CYAN: Color = Color::Rgb(0x56, 0xB6, 0xC2);

impl Theme {
    /// Hardcoded One Dark defaults, hex values from onedark.theme.
    pub fn onedark_default() -> Self {
        Self {
            groups: [GREEN, YELLOW, RED, BLUE, MAGENTA, CYAN],
            token_a: Color::Rgb(0xD1, 0x9A, 0x66),
            token_b: Color::Rgb(0x61, 0xAF, 0xEF),
            hint: Color::Rgb(0xFF, 0xD7, 0x00),
            item: YELLOW,
            connection: Color::Rgb(0xFF, 0xFF, 0xFF),
            bg: Color::Rgb(0x31, 0x35, 0x3F),
            div_line: Color::Rgb(0x3F, 0x44, 0x4F),
            main_fg: Color::Rgb(0xAB, 0xB2, 0xBF),
            title: YELLOW,
            inactive_fg: Color::Rgb(0x5C, 0x63, 0x70),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to One Dark defaults if path is None or the file is missing.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let path = match path {
            Some(p) if p.exists() => p,
            _ => return Ok(Self::default_for_palette(palette)),
        };
        let s = std::fs::read_to_string(path)?;
        let map = parse_theme_file(&s);
        let mut theme = Self::from_map(&map);
        theme.apply_palette(palette);
        Ok(theme)
    }

    fn default_for_palette(palette: crate::Palette) -> Self {
        let mut t = Self::onedark_default();
        t.apply_palette(palette);
        t
    }

    /// Override group and token colours for high-contrast or colorblind play.
    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => {
                self.groups = [
                    Color::Rgb(0x00, 0xFF, 0x00),
                    Color::Rgb(0xFF, 0xFF, 0x00),
                    Color::Rgb(0xFF, 0x00, 0x00),
                    Color::Rgb(0x00, 0x88, 0xFF),
                    Color::Rgb(0xFF, 0x00, 0xFF),
                    Color::Rgb(0x00, 0xFF, 0xFF),
                ];
                self.token_a = Color::Rgb(0xFF, 0xFF, 0xFF);
                self.token_b = Color::Rgb(0xFF, 0x88, 0x00);
            }
            crate::Palette::Colorblind => {
                // Paul Tol's vibrant set.
                self.groups = [
                    Color::Rgb(0x00, 0x77, 0xBB),
                    Color::Rgb(0xEE, 0x77, 0x33),
                    Color::Rgb(0x00, 0x99, 0x88),
                    Color::Rgb(0xCC, 0x33, 0x11),
                    Color::Rgb(0xEE, 0x33, 0x77),
                    Color::Rgb(0xBB, 0xBB, 0x00),
                ];
                self.token_a = Color::Rgb(0xEE, 0xEE, 0xEE);
                self.token_b = Color::Rgb(0x33, 0xBB, 0xEE);
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            map.get(key)
                .and_then(|v| parse_hex(v.trim_matches('"').trim_matches('\'').trim()).ok())
        };
        let base = Self::onedark_default();
        Self {
            groups: [
                get("mem_box").or_else(|| get("cpu_start")).unwrap_or(GREEN),
                get("title").or_else(|| get("cpu_mid")).unwrap_or(YELLOW),
                get("cpu_end").or_else(|| get("temp_end")).unwrap_or(RED),
                get("cpu_box").unwrap_or(BLUE),
                get("net_box").unwrap_or(MAGENTA),
                get("hi_fg").or_else(|| get("proc_misc")).unwrap_or(CYAN),
            ],
            token_a: get("selected_fg").unwrap_or(base.token_a),
            token_b: get("proc_box").unwrap_or(base.token_b),
            hint: get("hi_fg").unwrap_or(base.hint),
            item: get("title").unwrap_or(base.item),
            connection: get("graph_text").unwrap_or(base.connection),
            bg: get("meter_bg").unwrap_or(base.bg),
            div_line: get("div_line").unwrap_or(base.div_line),
            main_fg: get("main_fg").unwrap_or(base.main_fg),
            title: get("title").unwrap_or(base.title),
            inactive_fg: get("inactive_fg").unwrap_or(base.inactive_fg),
        }
    }

    /// Colour of a tile group (groups count from 1).
    #[inline]
    pub fn group_color(&self, group: u8) -> Color {
        self.groups[(group.saturating_sub(1) as usize) % self.groups.len()]
    }

    pub fn token_color(&self, id: crate::grid::TokenId) -> Color {
        match id {
            crate::grid::TokenId::A => self.token_a,
            crate::grid::TokenId::B => self.token_b,
        }
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(eq) = rest.find('=') {
            let value = rest[eq + 1..]
                .trim()
                .trim_matches('"')
                .trim_matches('\'')
                .to_string();
            if !value.is_empty() {
                map.insert(key.to_string(), value);
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    if !s.is_ascii() {
        return Err(invalid());
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&s[range], 16).map_err(|_| invalid());
    let (r, g, b) = match s.len() {
        6 => (channel(0..2)?, channel(2..4)?, channel(4..6)?),
        3 => (channel(0..1)? * 17, channel(1..2)? * 17, channel(2..3)? * 17),
        _ => return Err(invalid()),
    };
    Ok(Color::Rgb(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Palette;

    #[test]
    fn test_parse_hex_6() {
        let c = parse_hex("#98C379").unwrap();
        assert!(matches!(c, Color::Rgb(0x98, 0xC3, 0x79)));
    }

    #[test]
    fn test_parse_hex_3() {
        let c = parse_hex("#FFF").unwrap();
        assert!(matches!(c, Color::Rgb(255, 255, 255)));
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        assert!(parse_hex("#12345").is_err());
        assert!(parse_hex("#GGGGGG").is_err());
    }

    #[test]
    fn test_parse_theme_line() {
        let map = parse_theme_file(r##"theme[meter_bg]="#31353F""##);
        assert_eq!(map.get("meter_bg"), Some(&"#31353F".to_string()));
    }

    #[test]
    fn test_from_map_overrides_and_falls_back() {
        let map = parse_theme_file("theme[cpu_box]=\"#010203\"\n# comment\ntheme[main_fg]='#FFF'");
        let theme = Theme::from_map(&map);
        assert_eq!(theme.groups[3], Color::Rgb(1, 2, 3));
        assert_eq!(theme.main_fg, Color::Rgb(255, 255, 255));
        assert_eq!(theme.bg, Theme::onedark_default().bg);
    }

    #[test]
    fn test_group_colors_cycle() {
        let theme = Theme::default();
        assert_eq!(theme.group_color(1), GREEN);
        assert_eq!(theme.group_color(7), GREEN);
        assert_eq!(theme.group_color(4), BLUE);
    }

    #[test]
    fn test_palette_changes_groups() {
        let mut theme = Theme::default();
        theme.apply_palette(Palette::Colorblind);
        assert_ne!(theme.groups, Theme::default().groups);
        assert!(Theme::load(None, Palette::Normal).is_ok());
    }
}
