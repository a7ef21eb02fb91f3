// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Every field has a default, so a missing file or a partial file is fine.
// Values that would break the frame ring (zero slots, zero capacity) are
// rejected by `Config::validate`.

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
    pub ball: BallConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Bouncing Disc".to_string(),
            width: 1000,
            height: 1000,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub present_mode: String,
    pub clear_color: [f32; 4],
    pub frames_in_flight: usize,
    /// Upper bound on instances per cycle; sizes the staging and instance buffers.
    pub max_instances: usize,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            present_mode: "fifo".to_string(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            frames_in_flight: 3,
            max_instances: 16,
            vertex_shader: PathBuf::from("shaders/disc.vert.spv"),
            fragment_shader: PathBuf::from("shaders/disc.frag.spv"),
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_level: String,
    pub show_fps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_level: "info".to_string(),
            show_fps: true,
        }
    }
}

/// Initial state of the demo ball
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BallConfig {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
    pub gravity: f32,
}

impl Default for BallConfig {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            vx: 0.1,
            vy: 0.2,
            radius: 0.2,
            gravity: 0.5,
        }
    }
}

/// Where the active configuration came from.
///
/// Loading happens before the logger exists, so the outcome is kept and
/// reported with `log` once logging is up.
#[derive(Debug)]
pub enum ConfigSource {
    File(PathBuf),
    /// No file at the path
    Defaults(PathBuf),
    /// The file exists but could not be read, parsed or validated
    Rejected(anyhow::Error),
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => log::info!("Loaded configuration from {:?}", path),
            ConfigSource::Defaults(path) => {
                log::info!("Config file not found at {:?}, using defaults", path)
            }
            ConfigSource::Rejected(e) => {
                log::warn!("Failed to load config: {:#}. Using defaults.", e)
            }
        }
    }
}

impl Config {
    /// Load configuration from config.toml, falling back to defaults
    pub fn load() -> (Self, ConfigSource) {
        Self::load_or_default("config.toml")
    }

    /// Load configuration from `path`; defaults if it is missing or invalid
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, ConfigSource) {
        let path = path.as_ref();
        match Self::load_from_path(path) {
            Ok(Some(config)) => (config, ConfigSource::File(path.to_path_buf())),
            Ok(None) => (Config::default(), ConfigSource::Defaults(path.to_path_buf())),
            Err(e) => (Config::default(), ConfigSource::Rejected(e)),
        }
    }

    /// Load configuration from a specific path, `None` if there is no file
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(Some(config))
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the renderer cannot run with
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.window.width > 0 && self.window.height > 0,
            "window extent must be non-zero, got {}x{}",
            self.window.width,
            self.window.height
        );
        ensure!(
            self.graphics.frames_in_flight > 0,
            "frames_in_flight must be at least 1"
        );
        ensure!(
            self.graphics.max_instances > 0,
            "max_instances must be at least 1"
        );
        ensure!(
            self.ball.radius > 0.0 && self.ball.radius < 1.0,
            "ball radius must lie in (0, 1), got {}",
            self.ball.radius
        );
        Ok(())
    }

    /// Get present mode as Vulkan enum
    pub fn get_present_mode(&self) -> ash::vk::PresentModeKHR {
        match self.graphics.present_mode.to_lowercase().as_str() {
            "immediate" => ash::vk::PresentModeKHR::IMMEDIATE,
            "mailbox" => ash::vk::PresentModeKHR::MAILBOX,
            "fifo" => ash::vk::PresentModeKHR::FIFO,
            "fifo_relaxed" => ash::vk::PresentModeKHR::FIFO_RELAXED,
            _ => {
                log::warn!(
                    "Unknown present mode '{}', defaulting to FIFO",
                    self.graphics.present_mode
                );
                ash::vk::PresentModeKHR::FIFO
            }
        }
    }

    /// Log filter used when RUST_LOG is not set
    pub fn log_level(&self) -> log::LevelFilter {
        self.debug
            .log_level
            .parse()
            .unwrap_or(log::LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.window.width, 1000);
        assert_eq!(config.window.height, 1000);
        assert_eq!(config.graphics.frames_in_flight, 3);
        assert_eq!(config.graphics.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(config.get_present_mode(), ash::vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [graphics]
            frames_in_flight = 2
            present_mode = "Mailbox"

            [ball]
            radius = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(config.graphics.frames_in_flight, 2);
        assert_eq!(config.graphics.max_instances, 16);
        assert_eq!(config.get_present_mode(), ash::vk::PresentModeKHR::MAILBOX);
        assert_eq!(config.ball.radius, 0.1);
        assert_eq!(config.ball.gravity, 0.5);
    }

    #[test]
    fn unknown_present_mode_falls_back_to_fifo() {
        let config = Config::parse("[graphics]\npresent_mode = \"vsync-ish\"").unwrap();
        assert_eq!(config.get_present_mode(), ash::vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn zero_frames_in_flight_is_rejected() {
        let err = Config::parse("[graphics]\nframes_in_flight = 0").unwrap_err();
        assert!(err.to_string().contains("frames_in_flight"));
    }

    #[test]
    fn zero_extent_is_rejected() {
        assert!(Config::parse("[window]\nwidth = 0").is_err());
    }

    #[test]
    fn oversized_radius_is_rejected() {
        assert!(Config::parse("[ball]\nradius = 1.5").is_err());
    }

    fn scratch_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("disc-renderer-{}-{}.toml", std::process::id(), name));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn rejected_file_falls_back_to_defaults_and_keeps_reason() {
        let path = scratch_file("rejected", "[graphics]\nframes_in_flight = 0");
        let (config, source) = Config::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.graphics.frames_in_flight, 3);
        match source {
            ConfigSource::Rejected(e) => assert!(format!("{:#}", e).contains("frames_in_flight")),
            other => panic!("expected a rejected config, got {:?}", other),
        }
    }

    #[test]
    fn valid_file_is_loaded() {
        let path = scratch_file("valid", "[graphics]\nmax_instances = 4");
        let (config, source) = Config::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.graphics.max_instances, 4);
        assert!(matches!(source, ConfigSource::File(p) if p == path));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("disc-renderer-no-such-config.toml");
        let (config, source) = Config::load_or_default(&path);
        assert_eq!(config.window.width, 1000);
        assert!(matches!(source, ConfigSource::Defaults(_)));
    }

    #[test]
    fn log_level_parses_or_defaults() {
        let config = Config::parse("[debug]\nlog_level = \"debug\"").unwrap();
        assert_eq!(config.log_level(), log::LevelFilter::Debug);
        let config = Config::parse("[debug]\nlog_level = \"loud\"").unwrap();
        assert_eq!(config.log_level(), log::LevelFilter::Info);
    }
}
