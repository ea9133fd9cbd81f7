// SPDX-FileCopyrightText: GoCortexIO
// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Connection settings for one FortiManager
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FortiManagerSettings {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_adom")]
    pub adom: String,
    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,
    /// Honour proxy settings from the environment
    #[serde(default)]
    pub proxy: bool,
}

fn default_adom() -> String {
    "root".to_string()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ConfigFile {
    pub instance_name: String,
    pub fortimanager: Option<FortiManagerSettings>,
}

pub struct ConfigManager {
    root: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::with_root(".")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn instance_dir(&self, instance_name: &str) -> PathBuf {
        self.root.join(instance_name)
    }

    pub fn config_path(&self, instance_name: &str) -> PathBuf {
        self.instance_dir(instance_name).join("config.toml")
    }

    /// Where the persisted session context for an instance lives
    pub fn session_store_path(&self, instance_name: &str) -> PathBuf {
        self.instance_dir(instance_name).join("context.json")
    }

    pub fn load_settings(&self, instance_name: &str) -> Result<FortiManagerSettings> {
        let config_path = self.config_path(instance_name);

        if !config_path.exists() {
            return Err(anyhow::anyhow!(
                "Instance '{}' not found. Run 'fmctl init --instance {}' first",
                instance_name,
                instance_name
            ));
        }

        let config_content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: ConfigFile = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        let settings = config.fortimanager.ok_or_else(|| {
            anyhow::anyhow!("FortiManager is not configured in instance '{}'", instance_name)
        })?;

        Ok(FortiManagerSettings {
            url: expand_env_vars(&settings.url)?,
            username: expand_env_vars(&settings.username)?,
            password: expand_env_vars(&settings.password)?,
            adom: expand_env_vars(&settings.adom)?,
            insecure: settings.insecure,
            proxy: settings.proxy,
        })
    }

    pub fn settings_from_env() -> Result<FortiManagerSettings> {
        let url = env::var("FORTIMANAGER_URL")
            .context("FORTIMANAGER_URL environment variable not set")?;
        let username = env::var("FORTIMANAGER_USERNAME")
            .context("FORTIMANAGER_USERNAME environment variable not set")?;
        let password = env::var("FORTIMANAGER_PASSWORD")
            .context("FORTIMANAGER_PASSWORD environment variable not set")?;
        let adom = env::var("FORTIMANAGER_ADOM").unwrap_or_else(|_| default_adom());

        Ok(FortiManagerSettings {
            url,
            username,
            password,
            adom,
            insecure: false,
            proxy: false,
        })
    }

    pub fn init_instance(&self, instance_name: &str) -> Result<PathBuf> {
        let instance_dir = self.instance_dir(instance_name);
        fs::create_dir_all(&instance_dir).with_context(|| {
            format!("Failed to create instance directory: {}", instance_dir.display())
        })?;

        let config_path = self.config_path(instance_name);
        if config_path.exists() {
            return Err(anyhow::anyhow!(
                "Instance '{}' already has a config file at {}",
                instance_name,
                config_path.display()
            ));
        }

        let config_template = ConfigFile {
            instance_name: instance_name.to_string(),
            fortimanager: Some(FortiManagerSettings {
                url: "${FORTIMANAGER_URL}".to_string(),
                username: "${FORTIMANAGER_USERNAME}".to_string(),
                password: "${FORTIMANAGER_PASSWORD}".to_string(),
                adom: default_adom(),
                insecure: false,
                proxy: false,
            }),
        };

        let config_content = toml::to_string_pretty(&config_template)
            .context("Failed to serialize config template")?;

        fs::write(&config_path, config_content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(config_path)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Values written exactly as `${NAME}` are read from the environment
fn expand_env_vars(input: &str) -> Result<String> {
    if input.starts_with("${") && input.ends_with('}') && input.len() > 3 {
        let var_name = &input[2..input.len() - 1];
        env::var(var_name).with_context(|| format!("Environment variable {var_name} not set"))
    } else {
        Ok(input.to_string())
    }
}
