//! Configuration system for pricediff.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/pricediff/config.toml` and/or `.pricediff/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricediffConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings that affect the statistical analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Coverage of the reported confidence intervals.
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    /// Threshold on the interaction p-value for the plain-language verdict.
    #[serde(default = "default_significance_level")]
    pub significance_level: f64,
    /// Optional unit identifier column, excluded from outcome candidates.
    #[serde(default = "default_unit_column")]
    pub unit_column: String,
    /// `chrono` format strings tried in order when parsing the `date` column.
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
    /// Number of rows shown in the data preview.
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            confidence_level: default_confidence_level(),
            significance_level: default_significance_level(),
            unit_column: default_unit_column(),
            date_formats: default_date_formats(),
            preview_rows: default_preview_rows(),
        }
    }
}

fn default_confidence_level() -> f64 {
    0.95
}

fn default_significance_level() -> f64 {
    0.05
}

fn default_unit_column() -> String {
    "product_id".to_string()
}

fn default_date_formats() -> Vec<String> {
    vec![
        "%Y-%m-%d".to_string(),
        "%Y/%m/%d".to_string(),
        "%m/%d/%Y".to_string(),
        "%Y-%m-%d %H:%M:%S".to_string(),
    ]
}

fn default_preview_rows() -> usize {
    10
}

/// Output format of the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Markdown,
    Json,
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Text => write!(f, "text"),
            ReportFormat::Markdown => write!(f, "markdown"),
            ReportFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "json" => Ok(ReportFormat::Json),
            other => Err(ConfigError::InvalidValue {
                field: "report.format".into(),
                reason: format!("unknown format '{other}' (expected text, markdown or json)"),
            }),
        }
    }
}

/// Report presentation settings, including the narrative wording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub format: ReportFormat,
    /// Column at which plain-text paragraphs are wrapped.
    #[serde(default = "default_wrap_width")]
    pub wrap_width: usize,
    #[serde(default = "default_title")]
    pub title: String,
    /// What the intervention is called in the narrative.
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_treatment_label")]
    pub treatment_label: String,
    #[serde(default = "default_control_label")]
    pub control_label: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: ReportFormat::default(),
            wrap_width: default_wrap_width(),
            title: default_title(),
            subject: default_subject(),
            treatment_label: default_treatment_label(),
            control_label: default_control_label(),
        }
    }
}

fn default_wrap_width() -> usize {
    88
}

fn default_title() -> String {
    "Difference-in-Differences Pricing Analysis".to_string()
}

fn default_subject() -> String {
    "price change".to_string()
}

fn default_treatment_label() -> String {
    "treatment group".to_string()
}

fn default_control_label() -> String {
    "control group".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write JSON logs to the data directory in addition to stderr.
    #[serde(default = "default_true")]
    pub file_logging: bool,
    /// Explicit filter directive; overrides the `-v`/`-q` derived level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_logging: true,
            level: None,
        }
    }
}

fn default_true() -> bool {
    true
}

impl PricediffConfig {
    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.analysis.confidence_level;
        if !(level > 0.0 && level < 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "analysis.confidence_level".into(),
                reason: format!("{level} is not in (0, 1)"),
            });
        }
        let alpha = self.analysis.significance_level;
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "analysis.significance_level".into(),
                reason: format!("{alpha} is not in (0, 1)"),
            });
        }
        if self.analysis.date_formats.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "analysis.date_formats".into(),
                reason: "at least one date format is required".into(),
            });
        }
        if self.report.wrap_width < 20 {
            return Err(ConfigError::InvalidValue {
                field: "report.wrap_width".into(),
                reason: format!("{} is too narrow (minimum 20)", self.report.wrap_width),
            });
        }
        Ok(())
    }
}

/// Name of the per-workspace configuration directory.
pub const WORKSPACE_CONFIG_DIR: &str = ".pricediff";

/// Project directories used for user-level configuration and log files.
pub fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "pricediff", "pricediff")
}

/// Path of the workspace-level configuration file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(WORKSPACE_CONFIG_DIR).join("config.toml")
}

/// Load configuration with layered sources.
///
/// Later sources win: defaults, user config, workspace config, an explicit
/// file, `PRICEDIFF_` environment variables, then `overrides`.
pub fn load_config(
    workspace: Option<&Path>,
    explicit_file: Option<&Path>,
    overrides: Option<&PricediffConfig>,
) -> Result<PricediffConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(PricediffConfig::default()));

    // User-level config
    if let Some(dirs) = project_dirs() {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit_file {
        figment = figment.merge(Toml::file(path));
    }

    // Environment variables (PRICEDIFF_ANALYSIS__CONFIDENCE_LEVEL, PRICEDIFF_REPORT__FORMAT, etc.)
    figment = figment.merge(Env::prefixed("PRICEDIFF_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: PricediffConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    tracing::debug!(
        confidence_level = config.analysis.confidence_level,
        format = %config.report.format,
        "configuration loaded"
    );
    Ok(config)
}

/// Check whether a user-level or workspace-level config file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if let Some(dirs) = project_dirs() {
        if dirs.config_dir().join("config.toml").exists() {
            return true;
        }
    }

    if let Some(ws) = workspace {
        if workspace_config_path(ws).exists() {
            return true;
        }
    }

    false
}

/// Write the default configuration to `<workspace>/.pricediff/config.toml`.
///
/// Returns `Ok(None)` when a file already exists and was left untouched.
pub fn init_workspace_config(workspace: &Path) -> crate::error::Result<Option<PathBuf>> {
    let path = workspace_config_path(workspace);
    if path.exists() {
        return Ok(None);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(&PricediffConfig::default()).map_err(ConfigError::from)?;
    std::fs::write(&path, toml_str)?;
    Ok(Some(path))
}
