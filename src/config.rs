use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

const CONFIG_PATH_REL_HOME: &str = ".config/mawabot/config.toml";

/// Bot configuration
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub general: General,
    /// Reddit commands are disabled when this section is absent.
    pub reddit: Option<Reddit>,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct General {
    pub discord_token: String,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Extensions loaded at startup, in dispatch order.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct Reddit {
    pub api_id: String,
    pub api_secret: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_command_prefix() -> String {
    ";".to_owned()
}

fn default_extensions() -> Vec<String> {
    vec![
        "general".to_owned(),
        "text.meme".to_owned(),
        "text.reddit".to_owned(),
    ]
}

fn default_user_agent() -> String {
    "mawabot/1 by aismallard".to_owned()
}

fn default_timeout_seconds() -> u64 {
    10
}

impl Config {
    fn config_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|p| p.join(CONFIG_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub async fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
            anyhow!(
                "Could not open configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.map_err(|e| {
            anyhow!(
                "Could not read configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        Self::parse(&contents).map_err(|e| {
            anyhow!(
                "Could not parse configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub async fn reload(&mut self) -> Result<()> {
        let new = Self::load().await?;
        *self = new;
        Ok(())
    }
}
