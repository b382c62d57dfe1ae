// src/cfg/config.rs

use eyre::{eyre, Result};
use log::{debug, error};
use secure_string::SecureString;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};

use crate::oauth2::OAuth2Credentials;

pub const DEFAULT_CONFIG_FILE: &str = "imap-archive.yml";

/// How a batch is split into intermediates, thread roots and standalone messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassificationMode {
    /// Index every reply in the batch first, then classify the rest.
    #[default]
    TwoPhase,
    /// Classify in fetch order; a root is only detected if its replies came first.
    SinglePass,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RendererConfig {
    #[serde(default = "default_renderer_command")]
    pub command: String,

    #[serde(default = "default_renderer_args")]
    pub args: Vec<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: default_renderer_command(),
            args: default_renderer_args(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(alias = "imap-domain")]
    pub imap_domain: Option<String>,

    #[serde(alias = "imap-username")]
    pub imap_username: Option<String>,

    #[serde(alias = "imap-password", default, deserialize_with = "deserialize_secret")]
    pub imap_password: Option<SecureString>,

    // OAuth2 authentication (alternative to password)
    #[serde(alias = "oauth2-client-id", default, deserialize_with = "deserialize_secret")]
    pub oauth2_client_id: Option<SecureString>,

    #[serde(
        alias = "oauth2-client-secret",
        default,
        deserialize_with = "deserialize_secret"
    )]
    pub oauth2_client_secret: Option<SecureString>,

    #[serde(
        alias = "oauth2-refresh-token",
        default,
        deserialize_with = "deserialize_secret"
    )]
    pub oauth2_refresh_token: Option<SecureString>,

    /// parent labels; each is scanned along with its child labels
    pub mailboxes: Vec<String>,

    /// label marking messages to archive
    pub label: String,

    #[serde(alias = "consumed-label")]
    pub consumed_label: String,

    #[serde(alias = "valid-extensions", default)]
    pub valid_extensions: Vec<String>,

    #[serde(alias = "output-dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub classification: ClassificationMode,

    /// mark messages consumed even when their PDF failed to render
    #[serde(alias = "consume-failed-renders", default = "default_true")]
    pub consume_failed_renders: bool,

    #[serde(default)]
    pub renderer: RendererConfig,
}

/// How to log in to the IMAP server.
pub enum Credentials {
    Password { username: String, password: SecureString },
    OAuth2 { username: String, oauth2: OAuth2Credentials },
}

impl Config {
    /// Reject configurations that would archive nothing or never mark anything consumed.
    pub fn validate(&self) -> Result<()> {
        if self.mailboxes.is_empty() {
            return Err(eyre!("`mailboxes` must list at least one label to scan"));
        }
        if self.label.trim().is_empty() {
            return Err(eyre!("`label` must not be empty"));
        }
        if self.consumed_label.trim().is_empty() {
            return Err(eyre!("`consumed-label` must not be empty"));
        }
        if self.label == self.consumed_label {
            return Err(eyre!(
                "`label` and `consumed-label` are both '{}'; every message would look consumed",
                self.label
            ));
        }
        if self.renderer.command.trim().is_empty() {
            return Err(eyre!("`renderer.command` must not be empty"));
        }
        Ok(())
    }

    pub fn domain(&self) -> Result<&str> {
        self.imap_domain
            .as_deref()
            .ok_or_else(|| eyre!("No IMAP domain given (config `imap-domain`, --imap-domain or IMAP_DOMAIN)"))
    }

    /// Password wins over OAuth2 when both are configured.
    pub fn credentials(&self) -> Result<Credentials> {
        let username = self
            .imap_username
            .clone()
            .ok_or_else(|| eyre!("No IMAP username given (config `imap-username`, --imap-username or IMAP_USERNAME)"))?;

        if let Some(password) = &self.imap_password {
            return Ok(Credentials::Password {
                username,
                password: password.clone(),
            });
        }

        match (
            &self.oauth2_client_id,
            &self.oauth2_client_secret,
            &self.oauth2_refresh_token,
        ) {
            (Some(id), Some(secret), Some(token)) => Ok(Credentials::OAuth2 {
                username,
                oauth2: OAuth2Credentials {
                    client_id: id.clone(),
                    client_secret: secret.clone(),
                    refresh_token: token.clone(),
                },
            }),
            (None, None, None) => Err(eyre!("No IMAP password or OAuth2 credentials configured")),
            _ => Err(eyre!(
                "Incomplete OAuth2 credentials; need oauth2-client-id, oauth2-client-secret and oauth2-refresh-token"
            )),
        }
    }
}

/// Use `path` if it exists; for the default name, fall back to the user config dir.
pub fn resolve_config_path(path: &Path) -> PathBuf {
    if path.exists() || path != Path::new(DEFAULT_CONFIG_FILE) {
        return path.to_path_buf();
    }
    match dirs::config_dir() {
        Some(dir) => {
            let candidate = dir.join("imap-archive").join(DEFAULT_CONFIG_FILE);
            if candidate.exists() {
                debug!("Using config from {}", candidate.display());
                candidate
            } else {
                path.to_path_buf()
            }
        }
        None => path.to_path_buf(),
    }
}

pub fn load_config(config_path: &Path) -> Result<Config> {
    debug!("Loading configuration from {:?}", config_path);

    let content = fs::read_to_string(config_path).map_err(|e| {
        error!("Failed to read config file {}: {}", config_path.display(), e);
        eyre!("Failed to read config file {}: {}", config_path.display(), e)
    })?;

    let cfg: Config = serde_yaml::from_str(&content).map_err(|e| {
        error!("Failed to parse YAML: {}", e);
        eyre!("Failed to parse YAML: {}", e)
    })?;

    debug!("Successfully loaded configuration");
    Ok(cfg)
}

/// Secrets are moved straight into a `SecureString`, which zeroes itself on drop.
fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecureString>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.map(SecureString::from))
}

fn default_true() -> bool {
    true
}

fn default_renderer_command() -> String {
    "wkhtmltopdf".to_string()
}

fn default_renderer_args() -> Vec<String> {
    vec!["--quiet".to_string(), "-".to_string(), "-".to_string()]
}
