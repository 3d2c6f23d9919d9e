use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const MAX_QUERY_LIMIT: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pricing: PricingConfig,
    pub output: OutputConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Model id that overrides host detection, e.g. "claude-opus-4"
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: String, // "table" or "json"
    pub unicode: bool, // rounded box-drawing borders instead of ASCII
    pub decimal_places: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_limit: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "table".to_string(),
            unicode: true,
            decimal_places: 2,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { default_limit: 10 }
    }
}

impl Config {
    /// Load from the default location. A missing file yields the defaults;
    /// nothing is written.
    pub fn load() -> Result<Self> {
        Self::load_or_default_from(&Self::default_path()?)
    }

    /// Like [`Self::load_from`], but a missing file yields the defaults.
    pub fn load_or_default_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(path)
    }

    /// Config for recording and querying. An unusable file is logged and
    /// replaced by the defaults.
    pub fn load_lenient(path: &Path) -> Self {
        match Self::load_or_default_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring unusable config, using defaults: {e:#}");
                Self::default()
            }
        }
    }

    /// [`Self::load_lenient`] at the default location.
    pub fn load_default_lenient() -> Self {
        match Self::default_path() {
            Ok(path) => Self::load_lenient(&path),
            Err(e) => {
                warn!("Cannot locate config file, using defaults: {e:#}");
                Self::default()
            }
        }
    }

    /// Load from an explicit path. Missing, unreadable or malformed files are errors.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.sanitize();

        Ok(config)
    }

    /// Replace hand-edited values that are out of range with their defaults.
    fn sanitize(&mut self) {
        if !(1..=MAX_QUERY_LIMIT).contains(&self.query.default_limit) {
            let fallback = QueryConfig::default().default_limit;
            warn!(
                "query.default_limit = {} is outside 1-{MAX_QUERY_LIMIT}, using {fallback}",
                self.query.default_limit
            );
            self.query.default_limit = fallback;
        }
        if self.output.decimal_places > 10 {
            warn!(
                "output.decimal_places = {} is above 10, using 2",
                self.output.decimal_places
            );
            self.output.decimal_places = OutputConfig::default().decimal_places;
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_commented_toml();

        fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Generate TOML configuration with comments explaining each option
    pub fn to_commented_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# compstats Configuration File\n");
        output.push_str("#\n");
        output.push_str("# Statistics themselves live in stats.json next to this file and are\n");
        output.push_str("# managed by compstats; only the options below are user-editable.\n");
        output.push('\n');

        output.push_str("[pricing]\n");
        output.push_str("# Model used to estimate cost savings. When unset, the model is detected\n");
        output.push_str("# from the host (Claude Code, Cursor, VS Code) or SDK environment variables,\n");
        output.push_str("# falling back to claude-sonnet-4.\n");
        match &self.pricing.model {
            Some(model) => output.push_str(&format!("model = \"{model}\"\n")),
            None => output.push_str("# model = \"claude-sonnet-4\"\n"),
        }
        output.push('\n');

        output.push_str("[output]\n");
        output.push_str("# Default output format: \"table\" or \"json\" (overridden by --json)\n");
        output.push_str(&format!("format = \"{}\"\n", self.output.format));
        output.push_str("# Draw tables with unicode borders (false for plain ASCII)\n");
        output.push_str(&format!("unicode = {}\n", self.output.unicode));
        output.push_str("# Decimal places for dollar amounts\n");
        output.push_str(&format!("decimal_places = {}\n", self.output.decimal_places));
        output.push('\n');

        output.push_str("[query]\n");
        output.push_str(&format!(
            "# Number of detail records shown by default (1-{MAX_QUERY_LIMIT})\n"
        ));
        output.push_str(&format!("default_limit = {}\n", self.query.default_limit));

        output
    }

    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(home.join(".config").join("compstats"))
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "pricing.model" => {
                self.pricing.model = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "output.format" => {
                if !["table", "json"].contains(&value) {
                    anyhow::bail!("Invalid output format: {}. Must be 'table' or 'json'", value);
                }
                self.output.format = value.to_string();
            }
            "output.unicode" => {
                self.output.unicode = value
                    .parse()
                    .with_context(|| format!("Invalid boolean value: {}", value))?;
            }
            "output.decimal_places" => {
                let places: u8 = value
                    .parse()
                    .with_context(|| format!("Invalid decimal places value: {}", value))?;
                if places > 10 {
                    anyhow::bail!("Decimal places must be between 0 and 10");
                }
                self.output.decimal_places = places;
            }
            "query.default_limit" => {
                let limit: usize = value
                    .parse()
                    .with_context(|| format!("Invalid limit value: {}", value))?;
                if !(1..=MAX_QUERY_LIMIT).contains(&limit) {
                    anyhow::bail!("Default limit must be between 1 and {}", MAX_QUERY_LIMIT);
                }
                self.query.default_limit = limit;
            }
            _ => anyhow::bail!("Unknown configuration key: {}", key),
        }
        Ok(())
    }
}
