// src/cli.rs

use clap::Parser;
use secure_string::SecureString;
use std::path::PathBuf;

use imap_archive::cfg::config::{Config, DEFAULT_CONFIG_FILE};

/// Command-line interface options for imap-archive.
#[derive(Parser, Debug)]
#[command(
    name = "imap-archive",
    version = env!("GIT_DESCRIBE"),
    about = "Archive labeled Gmail conversations as PDFs, exactly once",
    long_about = None
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// IMAP server domain
    #[arg(short = 'D', long, env = "IMAP_DOMAIN")]
    pub imap_domain: Option<String>,

    /// IMAP username
    #[arg(short = 'U', long, env = "IMAP_USERNAME")]
    pub imap_username: Option<String>,

    /// IMAP password
    #[arg(short = 'P', long, env = "IMAP_PASSWORD", hide_env_values = true)]
    pub imap_password: Option<String>,

    #[arg(short, long, help = "debug logging, including the IMAP wire protocol")]
    pub debug: bool,
}

impl Cli {
    /// Command-line and environment values win over the config file.
    pub fn apply(&self, config: &mut Config) {
        if let Some(domain) = &self.imap_domain {
            config.imap_domain = Some(domain.clone());
        }
        if let Some(username) = &self.imap_username {
            config.imap_username = Some(username.clone());
        }
        if let Some(password) = &self.imap_password {
            config.imap_password = Some(SecureString::from(password.clone()));
        }
    }
}
