// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use docket_app::TabKind;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_VERSION: i64 = 1;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub ui: Ui,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            ui: Ui::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub start_tab: Option<String>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            start_tab: Some("invoices".to_owned()),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("DOCKET_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set DOCKET_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(docket_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is missing a version. Add `version = 1` and place values under [storage] and [ui]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.version != CONFIG_VERSION {
            bail!(
                "config {} has version {}; expected 1",
                path.display(),
                self.version
            );
        }

        if let Some(db_path) = &self.storage.db_path {
            docket_db::validate_db_path(db_path)?;
        }

        if let Some(start_tab) = &self.ui.start_tab {
            parse_start_tab(start_tab).with_context(|| {
                format!("invalid ui.start_tab in {}", path.display())
            })?;
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => docket_db::default_db_path(),
        }
    }

    pub fn start_tab(&self) -> TabKind {
        self.ui
            .start_tab
            .as_deref()
            .and_then(|raw| parse_start_tab(raw).ok())
            .unwrap_or(TabKind::Invoices)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# docket config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/docket/docket.db)\n# db_path = \"/absolute/path/to/docket.db\"\n\n[ui]\n# One of: invoices, delivery-notes\nstart_tab = \"invoices\"\n",
            path.display(),
        )
    }
}

fn parse_start_tab(raw: &str) -> Result<TabKind> {
    match raw {
        "invoices" => Ok(TabKind::Invoices),
        "delivery-notes" => Ok(TabKind::DeliveryNotes),
        other => bail!("unknown tab {other:?}; use one of: invoices, delivery-notes"),
    }
}
