use crate::clock::TickPolicy;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use ratatui::style::Color;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub theme: Theme,
    pub icons: Icons,
    pub timer: TimerConfig,
    pub notifications: NotificationConfig,
    pub push: Option<PushConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Theme {
    #[serde(deserialize_with = "hex_to_color")]
    pub background: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub foreground: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub selection: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub black: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub red: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub green: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub yellow: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub blue: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub magenta: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub cyan: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub gray: Color,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Icons {
    pub play: String,
    pub pause: String,
    pub stop: String,
    pub stage_done: String,
    pub stage_active: String,
    pub stage_pending: String,
    pub select: String,
    pub banner: String,
    pub separator: String,
    pub header_left: String,
    pub header_right: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TimerConfig {
    pub tick_policy: TickPolicy,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotificationConfig {
    /// Ring the terminal bell on stage completion.
    pub bell: bool,
    /// Show desktop notifications.
    pub desktop: bool,
    /// How long the on-screen banner stays up.
    pub banner_secs: u64,
}

/// External push service; leaving the section out disables pushes.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PushConfig {
    pub endpoint: String,
    pub subscription: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::Rgb(24, 18, 12),
            foreground: Color::Rgb(236, 224, 203),
            selection: Color::Rgb(230, 178, 96),
            black: Color::Rgb(38, 30, 22),
            red: Color::Rgb(214, 102, 84),
            green: Color::Rgb(152, 170, 108),
            yellow: Color::Rgb(222, 186, 112),
            blue: Color::Rgb(127, 168, 190),
            magenta: Color::Rgb(180, 140, 160),
            cyan: Color::Rgb(122, 168, 159),
            gray: Color::Rgb(150, 138, 120),
        }
    }
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            play: "▶".to_string(),
            pause: "⏸".to_string(),
            stop: "■".to_string(),
            stage_done: "✓".to_string(),
            stage_active: "●".to_string(),
            stage_pending: "○".to_string(),
            select: "▸".to_string(),
            banner: "🔔".to_string(),
            separator: "│".to_string(),
            header_left: "⟪ ".to_string(),
            header_right: " ⟫".to_string(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            bell: true,
            desktop: true,
            banner_secs: 10,
        }
    }
}

fn parse_hex(s: &str) -> Option<Color> {
    let hex = s.strip_prefix('#').filter(|h| h.len() == 6)?;
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

fn hex_to_color<'de, D>(deserializer: D) -> Result<Color, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    parse_hex(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid hex color {s:?}, expected #rrggbb")))
}

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "leaven", "leaven")
}

pub fn load_from(path: &Path) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {:?}", path))?;
    toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse config file at {:?}", path))
}

pub fn load_config() -> Result<Config> {
    match project_dirs() {
        Some(proj_dirs) => {
            let path = proj_dirs.config_dir().join("leaven.toml");
            if path.exists() {
                load_from(&path)
            } else {
                Ok(Config::default())
            }
        }
        None => Ok(Config::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_hex("#ff8000"), Some(Color::Rgb(255, 128, 0)));
        assert_eq!(parse_hex("ff8000"), None);
        assert_eq!(parse_hex("#ff80"), None);
        assert_eq!(parse_hex("#gg0000"), None);
    }

    #[test]
    fn empty_file_means_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.timer.tick_policy, TickPolicy::Discrete);
        assert!(config.notifications.bell);
        assert!(config.push.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r##"
            [theme]
            red = "#010203"

            [timer]
            tick_policy = "catch_up"

            [notifications]
            desktop = false

            [push]
            endpoint = "https://push.example.com/api"
            subscription = "abc"
            "##,
        )
        .unwrap();
        assert_eq!(config.theme.red, Color::Rgb(1, 2, 3));
        assert_eq!(config.theme.blue, Theme::default().blue);
        assert_eq!(config.timer.tick_policy, TickPolicy::CatchUp);
        assert!(!config.notifications.desktop);
        assert_eq!(config.notifications.banner_secs, 10);
        assert_eq!(config.push.unwrap().subscription, "abc");
    }

    #[test]
    fn bad_color_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaven.toml");
        fs::write(&path, "[theme]\nred = \"red\"\n").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("invalid hex color"));
        assert!(err.to_string().contains("leaven.toml"));
    }
}
