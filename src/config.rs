//! Player configuration
//!
//! Configuration is stored as YAML in the user's config directory.
//! Default location: ~/.config/waveplay/config.yaml

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tiny_skia::Color;

use crate::ui::waveform::Palette;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub surface: SurfaceConfig,
    pub palette: PaletteConfig,
}

/// Waveform surface sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Logical width used while the layout reports no size
    pub fallback_width: f32,
    /// Logical height used while the layout reports no size
    pub fallback_height: f32,
    /// Backing pixels per logical pixel; follows the display when unset
    pub device_pixel_ratio: Option<f32>,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            fallback_width: 800.0,
            fallback_height: 220.0,
            device_pixel_ratio: None,
        }
    }
}

impl SurfaceConfig {
    /// Configured pixel ratio, if it is usable.
    pub fn pixel_ratio_override(&self) -> Option<f32> {
        self.device_pixel_ratio.filter(|r| valid_ratio(*r))
    }

    /// Ratio to render at on a display with scale factor `display`.
    ///
    /// An explicit override wins; otherwise the display's factor, or 1.0 when
    /// that is nonsense too.
    pub fn pixel_ratio(&self, display: f32) -> f32 {
        self.pixel_ratio_override()
            .or_else(|| Some(display).filter(|r| valid_ratio(*r)))
            .unwrap_or(1.0)
    }
}

fn valid_ratio(ratio: f32) -> bool {
    ratio.is_finite() && ratio > 0.0
}

/// Surface colours as `#rrggbb` or `#rrggbbaa`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteConfig {
    pub background: String,
    pub grid: String,
    pub accent: String,
    pub playhead: String,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            background: "#1f1f26".into(),
            grid: "#dddddd".into(),
            accent: "#16a34a".into(),
            playhead: "#ef4444".into(),
        }
    }
}

impl PaletteConfig {
    /// Resolve to drawing colours, keeping the default for any entry that doesn't parse.
    pub fn resolve(&self) -> Palette {
        let defaults = Palette::default();
        Palette {
            background: resolve_color("background", &self.background, defaults.background),
            grid: resolve_color("grid", &self.grid, defaults.grid),
            accent: resolve_color("accent", &self.accent, defaults.accent),
            playhead: resolve_color("playhead", &self.playhead, defaults.playhead),
        }
    }
}

fn resolve_color(name: &str, value: &str, fallback: Color) -> Color {
    parse_hex_color(value).unwrap_or_else(|| {
        log::warn!("palette.{name}: '{value}' is not a hex colour, using default");
        fallback
    })
}

/// Parse `#rrggbb` / `#rrggbbaa` (leading `#` optional).
pub fn parse_hex_color(value: &str) -> Option<Color> {
    let hex = value.trim().trim_start_matches('#');
    if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Some(Color::from_rgba8(channel(0)?, channel(2)?, channel(4)?, alpha))
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("waveplay")
        .join("config.yaml")
}

/// Load configuration from a YAML file
///
/// Returns default config if the file doesn't exist or can't be parsed.
pub fn load_config(path: &Path) -> PlayerConfig {
    log::info!("load_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: Config file doesn't exist, using defaults");
        return PlayerConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<PlayerConfig>(&contents) {
            Ok(config) => {
                log::info!(
                    "load_config: Loaded config - surface {}x{} @ {:?}x",
                    config.surface.fallback_width,
                    config.surface.fallback_height,
                    config.surface.device_pixel_ratio
                );
                config
            }
            Err(e) => {
                log::warn!("load_config: Failed to parse config: {}, using defaults", e);
                PlayerConfig::default()
            }
        },
        Err(e) => {
            log::warn!(
                "load_config: Failed to read config file: {}, using defaults",
                e
            );
            PlayerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(
            parse_hex_color("#16a34a"),
            Some(Color::from_rgba8(22, 163, 74, 255))
        );
        assert_eq!(
            parse_hex_color("ef444480"),
            Some(Color::from_rgba8(239, 68, 68, 128))
        );
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#gggggg"), None);
        assert_eq!(parse_hex_color("#ééé"), None);
    }

    #[test]
    fn test_default_palette_matches_renderer_default() {
        assert_eq!(PaletteConfig::default().resolve(), Palette::default());
    }

    #[test]
    fn test_bad_colour_falls_back() {
        let config = PaletteConfig {
            accent: "green".into(),
            ..PaletteConfig::default()
        };
        assert_eq!(config.resolve().accent, Palette::default().accent);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: PlayerConfig =
            serde_yaml::from_str("surface:\n  device_pixel_ratio: 2.0\n").unwrap();
        assert_eq!(config.surface.device_pixel_ratio, Some(2.0));
        assert_eq!(config.surface.fallback_width, 800.0);
        assert_eq!(config.palette, PaletteConfig::default());
    }

    #[test]
    fn test_pixel_ratio_follows_display() {
        let surface = SurfaceConfig::default();
        assert_eq!(surface.pixel_ratio_override(), None);
        assert_eq!(surface.pixel_ratio(2.0), 2.0);
        assert_eq!(surface.pixel_ratio(f32::NAN), 1.0);
        assert_eq!(surface.pixel_ratio(0.0), 1.0);
    }

    #[test]
    fn test_pixel_ratio_override_wins() {
        let mut surface = SurfaceConfig::default();
        surface.device_pixel_ratio = Some(1.25);
        assert_eq!(surface.pixel_ratio(2.0), 1.25);

        surface.device_pixel_ratio = Some(-3.0);
        assert_eq!(surface.pixel_ratio_override(), None);
        assert_eq!(surface.pixel_ratio(2.0), 2.0);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/waveplay/config.yaml"));
        assert_eq!(config, PlayerConfig::default());
    }

    #[test]
    fn test_unparsable_file_uses_defaults() {
        let path = std::env::temp_dir().join(format!("waveplay-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "surface: [not, a, map").unwrap();
        let config = load_config(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(config, PlayerConfig::default());
    }
}
