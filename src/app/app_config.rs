//! Application configuration loading for CLI defaults.
//!
//! The config file is a flat `key = value` list with `#` comments. Strings are
//! double-quoted. Category overrides use dotted keys:
//!
//! ```text
//! root = "/data/cinemanet"
//! concurrency = 16
//! search_endpoint = "http://localhost:8080/search"
//! override.shot_type.max_images = 50
//! override.shot_type.timeout_secs = 120
//! ```

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use imageset_core::task::{ConfigOverride, ImageFormat, SizeClass};

const OVERRIDE_PREFIX: &str = "override.";

/// File configuration for imageset defaults.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// Default output root.
    pub root: Option<PathBuf>,
    /// Default concurrency (same range as CLI).
    pub concurrency: Option<u8>,
    /// Default maximum images per search term.
    pub max_images: Option<u32>,
    /// Default image format.
    pub image_format: Option<ImageFormat>,
    /// Default size class.
    pub size_class: Option<SizeClass>,
    /// Default per-task timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Image search endpoint URL.
    pub search_endpoint: Option<String>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
    /// Per-category overrides keyed by category name.
    pub overrides: BTreeMap<String, ConfigOverride>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=100).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=100");
        }
        validate_max_images("max_images", self.max_images)?;
        validate_timeout_secs("timeout_secs", self.timeout_secs)?;

        for (category, over) in &self.overrides {
            validate_max_images(&format!("override.{category}.max_images"), over.max_images)?;
            validate_timeout_secs(
                &format!("override.{category}.timeout_secs"),
                over.timeout.map(|t| t.as_secs()),
            )?;
        }
        Ok(())
    }
}

fn validate_max_images(field: &str, value: Option<u32>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if value > 10_000 {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 0..=10000");
    }
    Ok(())
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=86_400).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=86400");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Config path that was consulted, if any.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/imageset/config.toml`
/// 2. `$HOME/.config/imageset/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("imageset")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("imageset")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from `explicit` (which must exist) or the default path if present.
pub fn load_file_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = read_config_file(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(read_config_file(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn read_config_file(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        if let Some(rest) = key.strip_prefix(OVERRIDE_PREFIX) {
            let Some((category, field)) = rest.rsplit_once('.') else {
                bail!(
                    "Invalid override key '{key}' on line {line_no}: expected override.<category>.<field>"
                );
            };
            if category.is_empty() {
                bail!("Invalid override key '{key}' on line {line_no}: empty category name");
            }
            let over = cfg.overrides.entry(category.to_string()).or_default();
            match field {
                "max_images" => over.max_images = Some(parse_integer_u32(value).with_context(invalid)?),
                "image_format" => {
                    over.image_format = Some(
                        parse_string_literal(value)?
                            .parse::<ImageFormat>()
                            .with_context(invalid)?,
                    );
                }
                "size_class" => {
                    over.size_class = Some(
                        parse_string_literal(value)?
                            .parse::<SizeClass>()
                            .with_context(invalid)?,
                    );
                }
                "timeout_secs" => {
                    over.timeout = Some(Duration::from_secs(
                        parse_integer_u64(value).with_context(invalid)?,
                    ));
                }
                unknown => bail!("Unknown override field: '{unknown}' on line {line_no}"),
            }
            continue;
        }

        match key {
            "root" => {
                cfg.root = Some(PathBuf::from(parse_string_literal(value).with_context(invalid)?));
            }
            "concurrency" => cfg.concurrency = Some(parse_integer_u8(value).with_context(invalid)?),
            "max_images" => cfg.max_images = Some(parse_integer_u32(value).with_context(invalid)?),
            "image_format" => {
                cfg.image_format = Some(
                    parse_string_literal(value)
                        .with_context(invalid)?
                        .parse::<ImageFormat>()
                        .with_context(invalid)?,
                );
            }
            "size_class" => {
                cfg.size_class = Some(
                    parse_string_literal(value)
                        .with_context(invalid)?
                        .parse::<SizeClass>()
                        .with_context(invalid)?,
                );
            }
            "timeout_secs" => cfg.timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?),
            "search_endpoint" => {
                cfg.search_endpoint = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_no}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u8(raw_value: &str) -> Result<u8> {
    let value = parse_integer_u64(raw_value)?;
    u8::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u8"))
}

fn parse_integer_u32(raw_value: &str) -> Result<u32> {
    let value = parse_integer_u64(raw_value)?;
    u32::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u32"))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}
