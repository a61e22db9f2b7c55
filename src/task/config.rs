//! Per-task download configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Default number of images requested per search term.
pub const DEFAULT_MAX_IMAGES: u32 = 300;

/// Default per-task timeout (10 minutes).
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(600);

/// A configuration value could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field} '{value}': expected one of {expected}")]
pub struct ConfigValueError {
    /// Which setting was being parsed.
    pub field: &'static str,
    /// The rejected input.
    pub value: String,
    /// Human-readable list of accepted values.
    pub expected: &'static str,
}

/// Image file format requested from the search backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    /// JPEG images.
    #[default]
    Jpg,
    /// PNG images.
    Png,
    /// GIF images.
    Gif,
    /// WebP images.
    Webp,
    /// No format preference.
    Any,
}

impl ImageFormat {
    /// Returns the stable lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = ConfigValueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpg),
            "png" => Ok(Self::Png),
            "gif" => Ok(Self::Gif),
            "webp" => Ok(Self::Webp),
            "any" => Ok(Self::Any),
            _ => Err(ConfigValueError {
                field: "image format",
                value: value.to_string(),
                expected: "jpg, png, gif, webp, any",
            }),
        }
    }
}

/// Image size class requested from the search backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SizeClass {
    /// Large images only.
    Large,
    /// Medium images.
    #[default]
    Medium,
    /// Icon-sized images.
    Icon,
    /// No size preference.
    Any,
}

impl SizeClass {
    /// Returns the stable lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Large => "large",
            Self::Medium => "medium",
            Self::Icon => "icon",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeClass {
    type Err = ConfigValueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "large" => Ok(Self::Large),
            "medium" => Ok(Self::Medium),
            "icon" => Ok(Self::Icon),
            "any" => Ok(Self::Any),
            _ => Err(ConfigValueError {
                field: "size class",
                value: value.to_string(),
                expected: "large, medium, icon, any",
            }),
        }
    }
}

/// Settings shared read-only by every task of a run (unless overridden per category).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Maximum images requested per search term.
    pub max_images: u32,
    /// Requested image format.
    pub image_format: ImageFormat,
    /// Requested image size class.
    pub size_class: SizeClass,
    /// Wall-clock limit for one task's fetch.
    pub timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_images: DEFAULT_MAX_IMAGES,
            image_format: ImageFormat::default(),
            size_class: SizeClass::default(),
            timeout: DEFAULT_TASK_TIMEOUT,
        }
    }
}

/// Category-level overrides layered over the run's [`DownloadConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverride {
    /// Replacement for [`DownloadConfig::max_images`].
    pub max_images: Option<u32>,
    /// Replacement for [`DownloadConfig::image_format`].
    pub image_format: Option<ImageFormat>,
    /// Replacement for [`DownloadConfig::size_class`].
    pub size_class: Option<SizeClass>,
    /// Replacement for [`DownloadConfig::timeout`].
    pub timeout: Option<Duration>,
}

impl ConfigOverride {
    /// Returns true if no field is overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.max_images.is_none()
            && self.image_format.is_none()
            && self.size_class.is_none()
            && self.timeout.is_none()
    }

    /// Returns `base` with every set field replaced.
    #[must_use]
    pub fn apply_to(&self, base: &DownloadConfig) -> DownloadConfig {
        DownloadConfig {
            max_images: self.max_images.unwrap_or(base.max_images),
            image_format: self.image_format.unwrap_or(base.image_format),
            size_class: self.size_class.unwrap_or(base.size_class),
            timeout: self.timeout.unwrap_or(base.timeout),
        }
    }
}
