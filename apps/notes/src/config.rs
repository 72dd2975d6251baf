use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
};

use anyhow::{Context, Result};
use client_core::GraphqlEndpoints;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "notes.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub graphql_url: String,
    pub realtime_url: Option<String>,
    pub api_key: Option<String>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            graphql_url: "http://127.0.0.1:20002/graphql".into(),
            realtime_url: None,
            api_key: None,
            log_filter: "info".into(),
        }
    }
}

/// Command-line values that take precedence over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub graphql_url: Option<String>,
    pub realtime_url: Option<String>,
    pub api_key: Option<String>,
}

/// Defaults, then the TOML file, then environment, then command-line flags.
pub fn load_settings(overrides: &Overrides) -> Result<Settings> {
    let mut settings = Settings::default();

    match &overrides.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?;
            settings.apply_file(&raw).with_context(|| {
                format!("failed to parse config file '{}'", path.display())
            })?;
        }
        None => {
            if let Ok(raw) = fs::read_to_string(DEFAULT_CONFIG_FILE) {
                settings.apply_file(&raw).with_context(|| {
                    format!("failed to parse config file '{DEFAULT_CONFIG_FILE}'")
                })?;
            }
        }
    }

    settings.apply_env(|key| std::env::var(key).ok());
    settings.apply_overrides(overrides);
    Ok(settings)
}

impl Settings {
    pub fn apply_file(&mut self, raw: &str) -> Result<()> {
        let file_cfg = toml::from_str::<HashMap<String, String>>(raw)?;
        if let Some(v) = file_cfg.get("graphql_url") {
            self.graphql_url = v.clone();
        }
        if let Some(v) = file_cfg.get("realtime_url") {
            self.realtime_url = Some(v.clone());
        }
        if let Some(v) = file_cfg.get("api_key") {
            self.api_key = Some(v.clone());
        }
        if let Some(v) = file_cfg.get("log_filter") {
            self.log_filter = v.clone();
        }
        Ok(())
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("NOTES_GRAPHQL_URL") {
            self.graphql_url = v;
        }
        if let Some(v) = lookup("APP__GRAPHQL_URL") {
            self.graphql_url = v;
        }

        if let Some(v) = lookup("NOTES_REALTIME_URL") {
            self.realtime_url = Some(v);
        }
        if let Some(v) = lookup("APP__REALTIME_URL") {
            self.realtime_url = Some(v);
        }

        if let Some(v) = lookup("NOTES_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = lookup("APP__API_KEY") {
            self.api_key = Some(v);
        }

        if let Some(v) = lookup("APP__LOG_FILTER") {
            self.log_filter = v;
        }
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(v) = &overrides.graphql_url {
            self.graphql_url = v.clone();
        }
        if let Some(v) = &overrides.realtime_url {
            self.realtime_url = Some(v.clone());
        }
        if let Some(v) = &overrides.api_key {
            self.api_key = Some(v.clone());
        }
    }

    pub fn endpoints(&self) -> Result<GraphqlEndpoints> {
        let graphql_url = parse_url("graphql_url", &self.graphql_url)?;
        let realtime_url = self
            .realtime_url
            .as_deref()
            .map(|raw| parse_url("realtime_url", raw))
            .transpose()?;
        GraphqlEndpoints::new(graphql_url, realtime_url)
    }

    /// Api key with blank values treated as unset.
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}

fn parse_url(name: &str, raw: &str) -> Result<Url> {
    Url::parse(raw.trim()).with_context(|| format!("invalid {name} '{raw}'"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
