//! Configuration file support for talentpool
//!
//! Loads dashboard settings from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.talentpoolrc.json` in the working directory
//! 3. `talentpool.config.json` in the working directory
//!
//! All fields are optional. CLI flags take precedence over config file values.

use crate::classify::LabelRules;
use crate::folders::{normalize_folder, FolderCatalog};
use crate::funnel::{default_metrics, MetricSpec};
use crate::pivot::{CefrLevels, WindowAnchor, NO_CEFR, OTHER_CEFR};
use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const DEFAULT_LOOKBACK_DAYS: u32 = 60;
const DEFAULT_UNENGAGED_AFTER_DAYS: u32 = 7;
const DEFAULT_WINDOW_DAYS: u32 = 7;
const DEFAULT_DATABANK_FOLDER: &str = "Candidate Databank";
const DEFAULT_TALENT_POOL_FOLDER: &str = "Talent Pool";

const MAX_LOOKBACK_DAYS: u32 = 3650;
const MAX_WINDOW_DAYS: u32 = 31;

/// talentpool configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TalentpoolConfig {
    /// Days before the latest invitation covered by the default date range (default: 60)
    #[serde(default)]
    pub lookback_days: Option<u32>,

    /// Gap between consecutive activities that marks a candidate unengaged (default: 7)
    #[serde(default)]
    pub unengaged_after_days: Option<u32>,

    /// Folder whose arrivals are labeled databank (default: "Candidate Databank")
    #[serde(default)]
    pub databank_folder: Option<String>,

    /// Folder whose arrivals are labeled new (default: "Talent Pool")
    #[serde(default)]
    pub talent_pool_folder: Option<String>,

    /// Additional folder names treated as system folders
    #[serde(default)]
    pub extra_system_folders: Vec<String>,

    /// Known CEFR levels in display order (default: A1..C2)
    #[serde(default)]
    pub cefr_levels: Option<Vec<String>>,

    /// Daily breakdown window
    #[serde(default)]
    pub daily_window: Option<DailyWindowConfig>,

    /// Replacement metric list for the funnel summary
    #[serde(default)]
    pub metrics: Option<Vec<MetricSpec>>,
}

/// Daily breakdown window settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DailyWindowConfig {
    /// Number of days shown (default: 7)
    pub days: Option<u32>,
    /// Where the window ends (default: today, meaning it ends yesterday)
    pub anchor: Option<WindowAnchor>,
}

/// Settings every report computation reads
#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub catalog: FolderCatalog,
    pub label_rules: LabelRules,
    pub cefr_levels: CefrLevels,
    pub unengaged_after: Duration,
    pub window_days: u32,
    pub window_anchor: WindowAnchor,
    pub metrics: Vec<MetricSpec>,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        DashboardSettings {
            catalog: FolderCatalog::standard(),
            label_rules: LabelRules::default(),
            cefr_levels: CefrLevels::default(),
            unengaged_after: Duration::days(i64::from(DEFAULT_UNENGAGED_AFTER_DAYS)),
            window_days: DEFAULT_WINDOW_DAYS,
            window_anchor: WindowAnchor::default(),
            metrics: default_metrics(),
        }
    }
}

/// Resolved configuration ready for use
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub lookback_days: u32,
    pub unengaged_after_days: u32,
    pub databank_folder: String,
    pub talent_pool_folder: String,
    pub settings: DashboardSettings,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl TalentpoolConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if let Some(days) = self.lookback_days {
            if days > MAX_LOOKBACK_DAYS {
                anyhow::bail!(
                    "lookback_days must be at most {} (got {})",
                    MAX_LOOKBACK_DAYS,
                    days
                );
            }
        }

        if self.unengaged_after_days == Some(0) {
            anyhow::bail!("unengaged_after_days must be positive (got 0)");
        }

        for (name, value) in [
            ("databank_folder", &self.databank_folder),
            ("talent_pool_folder", &self.talent_pool_folder),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                anyhow::bail!("{} must not be empty", name);
            }
        }
        let databank = normalize_folder(
            self.databank_folder
                .as_deref()
                .unwrap_or(DEFAULT_DATABANK_FOLDER),
        );
        let talent_pool = normalize_folder(
            self.talent_pool_folder
                .as_deref()
                .unwrap_or(DEFAULT_TALENT_POOL_FOLDER),
        );
        if databank == talent_pool {
            anyhow::bail!(
                "databank_folder and talent_pool_folder must differ (both are {:?})",
                databank
            );
        }

        if let Some(levels) = &self.cefr_levels {
            if levels.is_empty() {
                anyhow::bail!("cefr_levels must not be empty");
            }
            let mut seen = HashSet::new();
            for level in levels {
                let level = level.trim();
                if level.is_empty() {
                    anyhow::bail!("cefr_levels must not contain empty entries");
                }
                if level.eq_ignore_ascii_case(OTHER_CEFR) || level.eq_ignore_ascii_case(NO_CEFR) {
                    anyhow::bail!("cefr_levels must not contain the reserved name {:?}", level);
                }
                if !seen.insert(level.to_ascii_uppercase()) {
                    anyhow::bail!("cefr_levels contains {:?} more than once", level);
                }
            }
        }

        if let Some(window) = &self.daily_window {
            if let Some(days) = window.days {
                if days == 0 || days > MAX_WINDOW_DAYS {
                    anyhow::bail!(
                        "daily_window.days must be between 1 and {} (got {})",
                        MAX_WINDOW_DAYS,
                        days
                    );
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            if metrics.is_empty() {
                anyhow::bail!("metrics must not be empty");
            }
            let mut titles = HashSet::new();
            for metric in metrics {
                if metric.title.trim().is_empty() {
                    anyhow::bail!("metrics entries must have a title");
                }
                if !titles.insert(metric.title.as_str()) {
                    anyhow::bail!("metrics contains the title {:?} more than once", metric.title);
                }
            }
        }

        Ok(())
    }

    /// Resolve config into the form the reports consume
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let databank_folder = self
            .databank_folder
            .clone()
            .unwrap_or_else(|| DEFAULT_DATABANK_FOLDER.to_string());
        let talent_pool_folder = self
            .talent_pool_folder
            .clone()
            .unwrap_or_else(|| DEFAULT_TALENT_POOL_FOLDER.to_string());

        // Renamed label folders stay system folders
        let mut extra = self.extra_system_folders.clone();
        extra.push(databank_folder.clone());
        extra.push(talent_pool_folder.clone());

        let unengaged_after_days = self
            .unengaged_after_days
            .unwrap_or(DEFAULT_UNENGAGED_AFTER_DAYS);

        let (window_days, window_anchor) = match &self.daily_window {
            Some(w) => (
                w.days.unwrap_or(DEFAULT_WINDOW_DAYS),
                w.anchor.unwrap_or_default(),
            ),
            None => (DEFAULT_WINDOW_DAYS, WindowAnchor::default()),
        };

        let settings = DashboardSettings {
            catalog: FolderCatalog::with_extra(extra.as_slice()),
            label_rules: LabelRules::new(&databank_folder, &talent_pool_folder),
            cefr_levels: match &self.cefr_levels {
                Some(levels) => CefrLevels::new(levels.as_slice()),
                None => CefrLevels::default(),
            },
            unengaged_after: Duration::days(i64::from(unengaged_after_days)),
            window_days,
            window_anchor,
            metrics: self.metrics.clone().unwrap_or_else(default_metrics),
        };

        Ok(ResolvedConfig {
            lookback_days: self.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
            unengaged_after_days,
            databank_folder,
            talent_pool_folder,
            settings,
            config_path: None,
        })
    }
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        TalentpoolConfig::default().resolve()
    }
}

/// Discover and load a config file from a directory
///
/// Search order:
/// 1. `.talentpoolrc.json`
/// 2. `talentpool.config.json`
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(dir: &Path) -> Result<Option<(TalentpoolConfig, PathBuf)>> {
    for name in [".talentpoolrc.json", "talentpool.config.json"] {
        let path = dir.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<TalentpoolConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: TalentpoolConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config in `dir`.
/// Returns default config if nothing is found.
pub fn load_and_resolve(dir: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(dir)? {
            Some((config, path)) => (config, Some(path)),
            None => (TalentpoolConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    if let Some(path) = &source_path {
        tracing::debug!(path = %path.display(), "loaded config");
    }
    resolved.config_path = source_path;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folders::FolderCondition;
    use std::fs;

    #[test]
    fn test_default_config_is_valid() {
        let config = TalentpoolConfig::default();
        config.validate().expect("default config should be valid");
        let resolved = config.resolve().expect("default config should resolve");
        assert_eq!(resolved.lookback_days, 60);
        assert_eq!(resolved.unengaged_after_days, 7);
        assert_eq!(resolved.settings.unengaged_after, Duration::days(7));
        assert_eq!(resolved.settings.window_days, 7);
        assert_eq!(resolved.settings.window_anchor, WindowAnchor::Today);
        assert_eq!(resolved.settings.metrics.len(), 12);
        assert_eq!(resolved.settings.cefr_levels, CefrLevels::default());
        assert!(resolved.config_path.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let json = r#"{}"#;
        let config: TalentpoolConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "lookback_days": 30,
            "unengaged_after_days": 10,
            "databank_folder": "Cooling Bank",
            "talent_pool_folder": "Ready Pool",
            "extra_system_folders": ["Pending Docs"],
            "cefr_levels": ["B1", "B2", "C1"],
            "daily_window": { "days": 14, "anchor": "end-date" },
            "metrics": [
                { "title": "Ready Pool to Client", "from": "Ready Pool", "to": "client folder" }
            ]
        }"#;
        let config: TalentpoolConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        let resolved = config.resolve().unwrap();
        let settings = &resolved.settings;
        assert_eq!(resolved.lookback_days, 30);
        assert_eq!(settings.unengaged_after, Duration::days(10));
        assert_eq!(settings.window_days, 14);
        assert_eq!(settings.window_anchor, WindowAnchor::EndDate);
        assert!(settings.catalog.is_system("pending docs"));
        assert!(settings.catalog.is_system("cooling bank"));
        assert!(settings.catalog.is_system("ready pool"));
        assert_eq!(settings.label_rules, LabelRules::new("Cooling Bank", "Ready Pool"));
        assert_eq!(settings.metrics.len(), 1);
        assert_eq!(settings.metrics[0].to, FolderCondition::ClientFolder);
        assert_eq!(
            settings.cefr_levels.categories(),
            vec!["B1", "B2", "C1", "Others", "No CEFR"]
        );
    }

    #[test]
    fn test_reject_unknown_fields() {
        let json = r#"{"unknown_field": true}"#;
        let result: std::result::Result<TalentpoolConfig, _> = serde_json::from_str(json);
        assert!(result.is_err());

        let nested = r#"{"daily_window": {"days": 3, "width": 2}}"#;
        let result: std::result::Result<TalentpoolConfig, _> = serde_json::from_str(nested);
        assert!(result.is_err());
    }

    #[test]
    fn test_reject_zero_unengaged_threshold() {
        let config = TalentpoolConfig {
            unengaged_after_days: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_window_out_of_range() {
        for days in [0, 32] {
            let config = TalentpoolConfig {
                daily_window: Some(DailyWindowConfig {
                    days: Some(days),
                    anchor: None,
                }),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "days = {days}");
        }
    }

    #[test]
    fn test_reject_same_label_folders() {
        let config = TalentpoolConfig {
            databank_folder: Some("Pool".to_string()),
            talent_pool_folder: Some(" pool ".to_string()),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_reject_bad_cefr_levels() {
        for levels in [
            vec![],
            vec!["A1".to_string(), " ".to_string()],
            vec!["A1".to_string(), "a1".to_string()],
            vec!["Others".to_string()],
        ] {
            let config = TalentpoolConfig {
                cefr_levels: Some(levels.clone()),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "levels = {levels:?}");
        }
    }

    #[test]
    fn test_reject_duplicate_metric_titles() {
        let config = TalentpoolConfig {
            metrics: Some(vec![
                MetricSpec::new("Same", "any", "Completed"),
                MetricSpec::new("Same", "Completed", "Passed MQ"),
            ]),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let empty = TalentpoolConfig {
            metrics: Some(vec![]),
            ..Default::default()
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_discover_rc_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".talentpoolrc.json"),
            r#"{"lookback_days": 14}"#,
        )
        .unwrap();

        let (config, path) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.lookback_days, Some(14));
        assert!(path.ends_with(".talentpoolrc.json"));
    }

    #[test]
    fn test_rc_file_wins_over_config_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".talentpoolrc.json"),
            r#"{"lookback_days": 14}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("talentpool.config.json"),
            r#"{"lookback_days": 21}"#,
        )
        .unwrap();

        let (config, _) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.lookback_days, Some(14));
    }

    #[test]
    fn test_discover_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_config(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_and_resolve_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        fs::write(&path, r#"{"daily_window": {"days": 3}}"#).unwrap();

        let resolved = load_and_resolve(dir.path(), Some(&path)).unwrap();
        assert_eq!(resolved.settings.window_days, 3);
        assert_eq!(resolved.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talentpool.config.json");
        fs::write(&path, r#"{"unengaged_after_days": 0}"#).unwrap();

        let err = load_and_resolve(dir.path(), None).unwrap_err();
        assert!(format!("{err:#}").contains("invalid config in"));
    }
}
