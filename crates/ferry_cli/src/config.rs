//! Configuration file support for ferry.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `FERRY_`, e.g., `FERRY_SLACK_TOKEN`)
//! 3. Config file (./ferry.toml, then ~/.config/ferry/config.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [slack]
//! token = "xoxb-..."  # or use FERRY_SLACK_TOKEN env var
//!
//! [linear]
//! token = "lin_api_..."  # or use FERRY_LINEAR_TOKEN env var
//!
//! [todoist]
//! token = "..."  # or use FERRY_TODOIST_TOKEN env var
//! base_url = "https://api.todoist.com/rest/v2"  # optional override
//!
//! [import]
//! concurrency = 3
//! batch_size = 20
//! include_threads = true
//! ```

use std::path::PathBuf;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use ferry::Platform;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub slack: PlatformConfig,
    pub linear: PlatformConfig,
    pub todoist: PlatformConfig,
    /// Defaults for import runs.
    pub import: ImportDefaults,
}

/// Credentials and endpoint for one platform.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// API token.
    pub token: Option<String>,
    /// API base URL override (GraphQL endpoint for Linear).
    pub base_url: Option<String>,
}

/// Default import options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ImportDefaults {
    /// Containers imported concurrently.
    pub concurrency: usize,
    /// Items stored between progress updates.
    pub batch_size: usize,
    pub include_threads: bool,
    pub include_comments: bool,
    pub include_completed: bool,
    pub include_archived: bool,
    pub include_files: bool,
    /// Abort runs after this many seconds.
    pub max_run_secs: Option<u64>,
}

impl Default for ImportDefaults {
    fn default() -> Self {
        Self {
            concurrency: ferry::import::DEFAULT_CONTAINER_CONCURRENCY,
            batch_size: ferry::import::DEFAULT_ITEM_BATCH_SIZE,
            include_threads: false,
            include_comments: false,
            include_completed: false,
            include_archived: false,
            include_files: false,
            max_run_secs: None,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/ferry/config.toml)
    /// 3. Local config file (./ferry.toml)
    /// 4. Environment variables with FERRY_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(proj_dirs) = ProjectDirs::from("", "", "ferry") {
            let xdg_config = proj_dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                tracing::debug!("Loading config from {:?}", xdg_config);
                builder = builder.add_source(
                    File::from(xdg_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        let local_config = PathBuf::from("ferry.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./ferry.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // FERRY_SLACK_TOKEN -> slack.token
        builder = builder.add_source(
            Environment::with_prefix("FERRY")
                .separator("_")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Settings for one platform.
    pub fn platform(&self, platform: Platform) -> &PlatformConfig {
        match platform {
            Platform::Slack => &self.slack,
            Platform::Linear => &self.linear,
            Platform::Todoist => &self.todoist,
        }
    }

    /// Token for a platform: explicit flag first, then configuration.
    pub fn token(&self, platform: Platform, flag: Option<String>) -> Option<String> {
        flag.or_else(|| self.platform(platform).token.clone())
            .filter(|t| !t.trim().is_empty())
    }
}
