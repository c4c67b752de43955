//! Site configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. The stock defaults
//! are overridden by a user `config.toml` found in the config directory
//! (the working directory unless `--config` says otherwise).
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [site]
//! name = "NailSalonNearYou.com"
//! base_url = "https://nailsalonnearyou.com"   # no trailing slash
//! image_base_url = ""                         # prefix for image paths
//! static_pages = ["about", "contact", "add-a-listing"]
//!
//! [data]
//! source = "data/data.zip"    # zip archive or directory of CSV files
//!
//! [graph]
//! city_tie_break = "last"     # salon listed in several cities: "first" | "last"
//!
//! [sitemap]
//! chunk_size = 200            # URLs per sitemap file
//! disallow = ["/admin/", "/wp-admin/", "/login/", "/cgi-bin/",
//!             "/*?q=*", "/*?s=*", "/*?search=*"]
//!
//! [colors]
//! primary = "#be185d"
//! primary_light = "#fbcfe8"
//! primary_dark = "#9d174d"
//! secondary = "#ec4899"
//! text = "#1f2937"
//! text_muted = "#6b7280"
//! background = "#f9fafb"
//!
//! [processing]
//! max_processes = 4           # Max parallel page writers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [site]
//! base_url = "https://staging.example.com"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::graph::CityTieBreak;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Site identity and absolute URLs.
    pub site: SiteSection,
    /// Where the CSV tables come from.
    pub data: DataConfig,
    /// Graph building rules.
    pub graph: GraphConfig,
    /// Sitemap partitioning and robots.txt rules.
    pub sitemap: SitemapConfig,
    /// Palette written into the generated stylesheet.
    pub colors: ColorConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.base_url.is_empty() {
            return Err(ConfigError::Validation(
                "site.base_url must not be empty".into(),
            ));
        }
        if self.site.base_url.ends_with('/') {
            return Err(ConfigError::Validation(
                "site.base_url must not end with '/'".into(),
            ));
        }
        if self.sitemap.chunk_size == 0 {
            return Err(ConfigError::Validation(
                "sitemap.chunk_size must be at least 1".into(),
            ));
        }
        if self.site.static_pages.iter().any(|p| p.is_empty() || p.contains('/')) {
            return Err(ConfigError::Validation(
                "site.static_pages entries must be single path segments".into(),
            ));
        }
        let colors = &self.colors;
        let named = [
            ("primary", &colors.primary),
            ("primary_light", &colors.primary_light),
            ("primary_dark", &colors.primary_dark),
            ("secondary", &colors.secondary),
            ("text", &colors.text),
            ("text_muted", &colors.text_muted),
            ("background", &colors.background),
        ];
        if let Some((name, _)) = named.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "colors.{name} must not be empty"
            )));
        }
        Ok(())
    }
}

/// Site identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSection {
    /// Display name used in titles and the footer.
    pub name: String,
    /// Absolute origin used in sitemaps and robots.txt, without trailing slash.
    pub base_url: String,
    /// Prefix prepended to image paths from the image table.
    pub image_base_url: String,
    /// Client-rendered pages (path segments) listed in the sitemaps.
    pub static_pages: Vec<String>,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            name: "NailSalonNearYou.com".to_string(),
            base_url: "https://nailsalonnearyou.com".to_string(),
            image_base_url: String::new(),
            static_pages: vec![
                "about".to_string(),
                "contact".to_string(),
                "add-a-listing".to_string(),
            ],
        }
    }
}

/// Data source location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Zip archive or directory holding the CSV tables.
    pub source: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: "data/data.zip".to_string(),
        }
    }
}

/// Graph building rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphConfig {
    /// Which row wins when a salon appears in the city junction table with
    /// more than one city.
    pub city_tie_break: CityTieBreak,
}

/// Sitemap settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SitemapConfig {
    /// Maximum number of URLs per sitemap file.
    pub chunk_size: usize,
    /// `Disallow:` rules written to robots.txt.
    pub disallow: Vec<String>,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            chunk_size: 200,
            disallow: [
                "/admin/",
                "/wp-admin/",
                "/login/",
                "/cgi-bin/",
                "/*?q=*",
                "/*?s=*",
                "/*?search=*",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Stylesheet palette.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorConfig {
    pub primary: String,
    pub primary_light: String,
    pub primary_dark: String,
    pub secondary: String,
    pub text: String,
    /// Secondary text (breadcrumbs, counts, captions).
    pub text_muted: String,
    pub background: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            primary: "#be185d".to_string(),
            primary_light: "#fbcfe8".to_string(),
            primary_dark: "#9d174d".to_string(),
            secondary: "#ec4899".to_string(),
            text: "#1f2937".to_string(),
            text_muted: "#6b7280".to_string(),
            background: "#f9fafb".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel page-rendering workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# salon-site configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Site identity
# ---------------------------------------------------------------------------
[site]
# Display name used in page titles and the footer.
name = "NailSalonNearYou.com"

# Absolute origin for sitemap and robots.txt URLs. No trailing slash.
base_url = "https://nailsalonnearyou.com"

# Prefix prepended to every path from image.csv (e.g. a CDN bucket URL).
image_base_url = ""

# Client-rendered pages listed in the sitemaps (single path segments).
static_pages = ["about", "contact", "add-a-listing"]

# ---------------------------------------------------------------------------
# Data source
# ---------------------------------------------------------------------------
[data]
# Zip archive or directory holding one CSV file per table.
source = "data/data.zip"

# ---------------------------------------------------------------------------
# Graph building
# ---------------------------------------------------------------------------
[graph]
# A salon listed in city_x_beauty_salon.csv with several cities is placed
# in exactly one of them: "last" keeps the last row, "first" the first.
city_tie_break = "last"

# ---------------------------------------------------------------------------
# Sitemaps and robots.txt
# ---------------------------------------------------------------------------
[sitemap]
# Maximum URLs per sitemap file. More URLs than this produce a sitemap index.
chunk_size = 200

# Disallow rules written to robots.txt.
disallow = [
    "/admin/",
    "/wp-admin/",
    "/login/",
    "/cgi-bin/",
    "/*?q=*",
    "/*?s=*",
    "/*?search=*",
]

# ---------------------------------------------------------------------------
# Colors (CSS custom properties in assets/css/styles.css)
# ---------------------------------------------------------------------------
[colors]
primary = "#be185d"
primary_light = "#fbcfe8"
primary_dark = "#9d174d"
secondary = "#ec4899"
text = "#1f2937"
text_muted = "#6b7280"    # Breadcrumbs, counts, captions
background = "#f9fafb"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel page-rendering workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

/// Generate CSS custom properties from color config.
pub fn generate_color_css(colors: &ColorConfig) -> String {
    format!(
        r#":root {{
    --primary-color: {primary};
    --primary-light: {primary_light};
    --primary-dark: {primary_dark};
    --secondary-color: {secondary};
    --text-color: {text};
    --light-text: {text_muted};
    --background: {background};
}}"#,
        primary = colors.primary,
        primary_light = colors.primary_light,
        primary_dark = colors.primary_dark,
        secondary = colors.secondary,
        text = colors.text,
        text_muted = colors.text_muted,
        background = colors.background,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_site_identity() {
        let config = SiteConfig::default();
        assert_eq!(config.site.base_url, "https://nailsalonnearyou.com");
        assert_eq!(config.site.static_pages.len(), 3);
    }

    #[test]
    fn default_config_has_sitemap_settings() {
        let config = SiteConfig::default();
        assert_eq!(config.sitemap.chunk_size, 200);
        assert!(config.sitemap.disallow.contains(&"/admin/".to_string()));
        assert!(config.sitemap.disallow.contains(&"/*?search=*".to_string()));
    }

    #[test]
    fn default_tie_break_is_last() {
        let config = SiteConfig::default();
        assert_eq!(config.graph.city_tie_break, CityTieBreak::Last);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
[site]
base_url = "https://staging.example.com"
"##;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        // Overridden value
        assert_eq!(config.site.base_url, "https://staging.example.com");
        // Default values preserved
        assert_eq!(config.site.name, "NailSalonNearYou.com");
        assert_eq!(config.sitemap.chunk_size, 200);
        assert_eq!(config.colors.primary, "#be185d");
    }

    #[test]
    fn parse_tie_break() {
        let toml = r#"
[graph]
city_tie_break = "first"
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.graph.city_tie_break, CityTieBreak::First);
    }

    #[test]
    fn parse_unknown_tie_break_is_error() {
        let toml = r#"
[graph]
city_tie_break = "random"
"#;
        let result: Result<SiteConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn generate_css_uses_config_colors() {
        let colors = ColorConfig {
            primary: "#123456".to_string(),
            ..ColorConfig::default()
        };
        let css = generate_color_css(&colors);
        assert!(css.contains("--primary-color: #123456"));
        assert!(css.contains("--background: #f9fafb"));
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.site.base_url, "https://nailsalonnearyou.com");
        assert_eq!(config.data.source, "data/data.zip");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[data]
source = "exports/salons"

[sitemap]
chunk_size = 50
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.data.source, "exports/salons");
        assert_eq!(config.sitemap.chunk_size, 50);
        // Unspecified values should be defaults
        assert_eq!(config.sitemap.disallow.len(), 7);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "this is not valid toml [[[").unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // Processing config tests
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let config = ProcessingConfig {
            max_processes: None,
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(100_000),
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_zero_means_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // Merge tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"chunk_size = 200"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"chunk_size = 50"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("chunk_size").unwrap().as_integer(), Some(50));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[sitemap]
chunk_size = 200
disallow = ["/admin/"]
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[sitemap]
chunk_size = 10
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let sitemap = merged.get("sitemap").unwrap();
        assert_eq!(sitemap.get("chunk_size").unwrap().as_integer(), Some(10));
        // disallow preserved from base
        assert_eq!(sitemap.get("disallow").unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn merge_toml_arrays_replace_not_append() {
        let base: toml::Value = toml::from_str(r#"disallow = ["/a/", "/b/"]"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"disallow = ["/c/"]"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("disallow").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Unknown key rejection and validation
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let toml_str = r#"
[sitemap]
chunk_sise = 90
"#;
        let result: Result<SiteConfig, _> = toml::from_str(toml_str);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let toml_str = r#"
[sitemaps]
chunk_size = 90
"#;
        let result: Result<SiteConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(SiteConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_zero_chunk_size() {
        let mut config = SiteConfig::default();
        config.sitemap.chunk_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_trailing_slash_base_url() {
        let mut config = SiteConfig::default();
        config.site.base_url = "https://example.com/".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_nested_static_page() {
        let mut config = SiteConfig::default();
        config.site.static_pages = vec!["about/team".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_empty_color() {
        let mut config = SiteConfig::default();
        config.colors.text_muted = " ".to_string();
        match config.validate() {
            Err(ConfigError::Validation(msg)) => assert!(msg.contains("colors.text_muted")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[sitemap]
chunk_size = 0
"#,
        )
        .unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = SiteConfig::default();
        assert_eq!(config.site.base_url, defaults.site.base_url);
        assert_eq!(config.site.static_pages, defaults.site.static_pages);
        assert_eq!(config.data.source, defaults.data.source);
        assert_eq!(config.graph.city_tie_break, defaults.graph.city_tie_break);
        assert_eq!(config.sitemap.chunk_size, defaults.sitemap.chunk_size);
        assert_eq!(config.sitemap.disallow, defaults.sitemap.disallow);
        assert_eq!(config.colors.primary, defaults.colors.primary);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let value = stock_defaults_value();
        for section in ["site", "data", "graph", "sitemap", "colors", "processing"] {
            assert!(value.get(section).is_some(), "missing section {section}");
        }
    }
}
