use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::CliArgs;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
struct ConfigFile {
    #[serde(default, alias = "url", alias = "backend")]
    base_url: Option<String>,
    #[serde(default)]
    log_filter: Option<String>,
    #[serde(default)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: Url,
    pub log_filter: String,
    pub log_file: Option<PathBuf>,
    pub source: Option<String>,
}

impl Settings {
    pub fn resolve(args: &CliArgs) -> Result<Self> {
        let path = args.config.clone().or_else(discover_config_path);
        let (file, source) = match &path {
            Some(path) => (load_config_file(path)?, Some(path.display().to_string())),
            None => (ConfigFile::default(), None),
        };
        Self::merge(args, file, source)
    }

    fn merge(args: &CliArgs, file: ConfigFile, source: Option<String>) -> Result<Self> {
        let raw_url = args
            .base_url
            .clone()
            .or(file.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            base_url: parse_base_url(&raw_url)?,
            log_filter: args
                .log_filter
                .clone()
                .or(file.log_filter)
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            log_file: args.log_file.clone().or(file.log_file),
            source,
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("invalid base url '{raw}'"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => anyhow::bail!("base url '{raw}' must use http or https, not {other}"),
    }
}

fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("FLEETDASH_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("fleetdash.yaml"),
        PathBuf::from("fleetdash.yml"),
        PathBuf::from(".fleetdash.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/fleetdash/config.yaml"),
            PathBuf::from(&home).join(".fleetdash.yaml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}
