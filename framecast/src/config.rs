use anyhow::{Context, Result};
use common::{ClientApi, GraphicsAttributes, ImageQuality, PixelFormat, Rect};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::display::DisplaySettings;
use crate::frame::{ImageSettings, parse_hex_color};
use crate::gpu::GraphicsSettings;
use crate::orchestrator::PipelineSettings;
use crate::validate_enum;
use crate::video::{DecodeSettings, RetryPolicy};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralSettings,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub graphics: GraphicsConfig,

    #[serde(default)]
    pub decode: DecodeConfig,

    #[serde(default)]
    pub image: ImageConfig,
}

/// General settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Overlay plane placement
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub index: u32,

    #[serde(default = "default_layer")]
    pub layer: i32,

    #[serde(default)]
    pub priority: i32,

    /// Destination rectangle; the whole screen when unset
    #[serde(default)]
    pub dest: Option<Rect>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            index: common::MAIN_DISPLAY,
            layer: default_layer(),
            priority: 0,
            dest: None,
        }
    }
}

fn default_layer() -> i32 {
    1
}

/// Requested framebuffer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphicsConfig {
    #[serde(default = "default_api")]
    pub api: String,

    #[serde(default = "default_channel_bits")]
    pub red: u8,

    #[serde(default = "default_channel_bits")]
    pub green: u8,

    #[serde(default = "default_channel_bits")]
    pub blue: u8,

    #[serde(default = "default_channel_bits")]
    pub alpha: u8,

    /// Unset means "don't care"
    #[serde(default)]
    pub luminance: Option<u8>,

    #[serde(default = "default_samples")]
    pub samples: u8,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            api: default_api(),
            red: 8,
            green: 8,
            blue: 8,
            alpha: 8,
            luminance: None,
            samples: default_samples(),
        }
    }
}

fn default_api() -> String {
    "openvg".to_string()
}
fn default_channel_bits() -> u8 {
    8
}
fn default_samples() -> u8 {
    1
}

/// Decode source and receive-retry budget
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecodeConfig {
    #[serde(default = "default_decode_backend")]
    pub backend: String,

    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default)]
    pub stream: usize,

    /// 0 = unbounded
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// 0 = no deadline
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            backend: default_decode_backend(),
            format: default_format(),
            path: default_path(),
            stream: 0,
            max_attempts: default_max_attempts(),
            deadline_ms: default_deadline_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_decode_backend() -> String {
    "sim".to_string()
}
fn default_format() -> String {
    "v4l2".to_string()
}
fn default_path() -> String {
    "/dev/video0".to_string()
}
fn default_max_attempts() -> u32 {
    100
}
fn default_deadline_ms() -> u64 {
    5000
}
fn default_poll_interval_ms() -> u64 {
    10
}

/// GPU image settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageConfig {
    #[serde(default = "default_image_format")]
    pub format: String,

    #[serde(default = "default_quality")]
    pub quality: Vec<String>,

    /// Hex colour painted before the frame, e.g. "#000000"
    #[serde(default)]
    pub clear_color: Option<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            format: default_image_format(),
            quality: default_quality(),
            clear_color: None,
        }
    }
}

fn default_image_format() -> String {
    "srgbx8888".to_string()
}
fn default_quality() -> Vec<String> {
    vec!["nonantialiased".to_string()]
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded configuration from {}", path.display());
        config.validate()?;

        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("framecast");

        Ok(config_dir.join("config.toml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        validate_log_level(&self.general.log_level)?;
        validate_api(&self.graphics.api)?;
        validate_decode_backend(&self.decode.backend)?;
        validate_image_format(&self.image.format)?;
        for quality in &self.image.quality {
            validate_quality(quality)?;
        }

        if let Some(ref color) = self.image.clear_color
            && parse_hex_color(color).is_none()
        {
            anyhow::bail!("Invalid clear color: {} (expected #RRGGBB or #RRGGBBAA)", color);
        }
        if let Some(dest) = self.display.dest
            && (dest.width <= 0 || dest.height <= 0)
        {
            anyhow::bail!("Invalid destination rectangle: {}", dest);
        }
        if self.graphics.samples == 0 {
            anyhow::bail!("Invalid sample count: 0");
        }

        Ok(())
    }

    /// Pipeline settings described by this configuration.
    ///
    /// Expands `~` and environment variables in the decode path.
    pub fn pipeline_settings(&self) -> Result<PipelineSettings> {
        self.validate()?;

        let api = match self.graphics.api.as_str() {
            "opengles" => ClientApi::OpenGlEs,
            _ => ClientApi::OpenVg,
        };
        let format = PixelFormat::from_name(&self.image.format)
            .with_context(|| format!("Invalid image format: {}", self.image.format))?;
        let quality = self
            .image
            .quality
            .iter()
            .map(|name| {
                ImageQuality::from_name(name)
                    .with_context(|| format!("Invalid image quality: {}", name))
            })
            .collect::<Result<Vec<_>>>()?;
        let path = shellexpand::full(&self.decode.path)
            .with_context(|| format!("Failed to expand path: {}", self.decode.path))?
            .into_owned();

        Ok(PipelineSettings {
            display: DisplaySettings {
                index: self.display.index,
                layer: self.display.layer,
                priority: self.display.priority,
                dest: self.display.dest,
            },
            graphics: GraphicsSettings {
                api,
                attributes: GraphicsAttributes {
                    red: self.graphics.red,
                    green: self.graphics.green,
                    blue: self.graphics.blue,
                    alpha: self.graphics.alpha,
                    luminance: self.graphics.luminance,
                    samples: self.graphics.samples,
                },
                ..GraphicsSettings::default()
            },
            decode: DecodeSettings {
                format: self.decode.format.clone(),
                path,
                stream: self.decode.stream,
                retry: self.decode.retry_policy(),
            },
            image: ImageSettings {
                format,
                quality,
                clear: self.image.clear_color.as_deref().and_then(parse_hex_color),
            },
        })
    }
}

fn validate_log_level(level: &str) -> Result<()> {
    validate_enum!(level, "trace", "debug", "info", "warn", "error")
}

fn validate_api(api: &str) -> Result<()> {
    validate_enum!(api, "openvg", "opengles")
}

fn validate_decode_backend(backend: &str) -> Result<()> {
    validate_enum!(backend, "sim", "still", "gst")
}

fn validate_image_format(format: &str) -> Result<()> {
    validate_enum!(format, "srgbx8888")
}

fn validate_quality(quality: &str) -> Result<()> {
    validate_enum!(quality, "nonantialiased", "faster", "better")
}

impl DecodeConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: (self.max_attempts > 0).then_some(self.max_attempts),
            deadline: (self.deadline_ms > 0).then(|| Duration::from_millis(self.deadline_ms)),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.display.layer, 1);
        assert_eq!(config.decode.format, "v4l2");
        assert_eq!(config.decode.path, "/dev/video0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_settings_match_pipeline_defaults() {
        let settings = Config::default().pipeline_settings().unwrap();
        assert_eq!(settings.display, DisplaySettings::default());
        assert_eq!(settings.graphics, GraphicsSettings::default());
        assert_eq!(settings.decode, DecodeSettings::default());
        assert_eq!(settings.image, ImageSettings::default());
    }

    #[test]
    fn test_validate_rejects_unknown_values() {
        let mut config = Config::default();
        config.decode.backend = "ffmpeg".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.image.quality = vec!["best".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.image.clear_color = Some("#zzzzzz".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.display.dest = Some(Rect::new(0, 0, 0, 480));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_policy_zero_means_unbounded() {
        let decode = DecodeConfig {
            max_attempts: 0,
            deadline_ms: 0,
            ..DecodeConfig::default()
        };
        let policy = decode.retry_policy();
        assert_eq!(policy.max_attempts, None);
        assert_eq!(policy.deadline, None);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r##"
[general]
log_level = "debug"

[display]
index = 2
layer = 5
dest = { x = 10, y = 20, width = 320, height = 240 }

[graphics]
alpha = 0
luminance = 0

[decode]
backend = "still"
format = "png"
path = "/tmp/frame.png"
max_attempts = 3
deadline_ms = 0

[image]
quality = ["faster", "better"]
clear_color = "#102030"
"##;

        let config: Config = toml::from_str(toml).unwrap();
        let settings = config.pipeline_settings().unwrap();
        assert_eq!(settings.display.index, 2);
        assert_eq!(settings.display.layer, 5);
        assert_eq!(settings.display.dest, Some(Rect::new(10, 20, 320, 240)));
        assert_eq!(settings.graphics.attributes.alpha, 0);
        assert_eq!(settings.graphics.attributes.luminance, Some(0));
        assert_eq!(settings.decode.format, "png");
        assert_eq!(settings.decode.retry.max_attempts, Some(3));
        assert_eq!(settings.decode.retry.deadline, None);
        assert_eq!(
            settings.image.quality,
            vec![ImageQuality::Faster, ImageQuality::Better]
        );
        assert_eq!(settings.image.clear, Some((0x10, 0x20, 0x30, 0xff)));
    }
}
