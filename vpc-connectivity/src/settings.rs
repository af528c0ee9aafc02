//! Analysis settings loaded from TOML.
//!
//! The embedded `defaults/settings.toml` is used unless the caller supplies a
//! file. Settings define which ranges are reserved (never public internet) and
//! the default report options.

use std::fs;
use std::path::Path;

use netset_core::IpBlock;
use serde::Deserialize;
use thiserror::Error;

use crate::error::AnalysisError;

/// Granularity of a connectivity report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisLevel {
    #[default]
    Endpoints,
    Subnets,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnalysisDefaults {
    #[serde(default)]
    pub grouping: bool,
    #[serde(default)]
    pub level: AnalysisLevel,
}

/// A range excluded from the public internet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReservedRange {
    pub cidr: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub analysis: AnalysisDefaults,
    #[serde(default)]
    pub reserved: Vec<ReservedRange>,
}

/// Errors returned when loading a settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

impl Settings {
    /// All of IPv4 except the reserved ranges.
    pub fn public_internet(&self) -> Result<IpBlock, AnalysisError> {
        let mut reserved = IpBlock::empty();
        for range in &self.reserved {
            reserved = reserved.union(&IpBlock::from_cidr(&range.cidr)?);
        }
        Ok(IpBlock::all_ipv4().subtract(&reserved))
    }
}

/// Load settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    let raw = fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_settings(&raw, path.display().to_string())
}

/// Built-in settings.
pub fn default_settings() -> Settings {
    let embedded = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/defaults/settings.toml"
    ));
    match parse_settings(embedded, "embedded settings".to_string()) {
        Ok(settings) if !settings.reserved.is_empty() => settings,
        _ => fallback_settings(),
    }
}

/// Load `path` when given, falling back to the embedded defaults on failure.
pub fn resolve_settings(path: Option<&Path>) -> (Settings, String) {
    let Some(path) = path else {
        return (default_settings(), "embedded".to_string());
    };
    match load_settings(path) {
        Ok(settings) => (settings, format!("file:{}", path.display())),
        Err(err) => {
            log::warn!("{err}; using embedded settings");
            (default_settings(), "embedded".to_string())
        }
    }
}

fn parse_settings(raw: &str, path: String) -> Result<Settings, SettingsError> {
    toml::from_str(raw).map_err(|source| SettingsError::Parse { path, source })
}

fn fallback_settings() -> Settings {
    let reserved = [
        "0.0.0.0/8",
        "10.0.0.0/8",
        "100.64.0.0/10",
        "127.0.0.0/8",
        "169.254.0.0/16",
        "172.16.0.0/12",
        "192.168.0.0/16",
        "224.0.0.0/4",
        "240.0.0.0/4",
    ];
    Settings {
        analysis: AnalysisDefaults::default(),
        reserved: reserved
            .iter()
            .map(|cidr| ReservedRange {
                cidr: (*cidr).to_string(),
                note: "built-in".to_string(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{default_settings, load_settings, resolve_settings, AnalysisLevel};

    #[test]
    fn embedded_defaults_exclude_private_ranges() {
        let public = default_settings().public_internet().expect("public");
        assert!(!public.contains("10.1.2.3".parse().unwrap()));
        assert!(!public.contains("192.168.1.1".parse().unwrap()));
        assert!(public.contains("8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.toml");
        fs::write(
            &path,
            "[analysis]\ngrouping = true\nlevel = \"subnets\"\n\n[[reserved]]\ncidr = \"10.0.0.0/8\"\n",
        )
        .expect("write");
        let settings = load_settings(&path).expect("load");
        assert!(settings.analysis.grouping);
        assert_eq!(settings.analysis.level, AnalysisLevel::Subnets);
        let public = settings.public_internet().expect("public");
        assert!(public.contains("192.168.1.1".parse().unwrap()));
    }

    #[test]
    fn unreadable_file_falls_back() {
        let (settings, source) = resolve_settings(Some("/nonexistent/settings.toml".as_ref()));
        assert_eq!(source, "embedded");
        assert!(!settings.reserved.is_empty());
    }
}
