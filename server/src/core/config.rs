use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_HOST, DEFAULT_MAX_LEADS_PER_USER, DEFAULT_PORT,
    FB_GRAPH_BASE,
};

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Facebook integration configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FacebookFileConfig {
    pub app_secret: Option<String>,
    pub verify_token: Option<String>,
    pub access_token: Option<String>,
    /// Graph API base URL (overridable for tests)
    pub graph_base: Option<String>,
}

/// Assignment configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AssignmentFileConfig {
    pub max_leads_per_user: Option<u32>,
}

/// Pipeline configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PipelineFileConfig {
    /// Path to a JSON file overriding the transition graph
    pub transitions_file: Option<String>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub facebook: Option<FacebookFileConfig>,
    pub assignment: Option<AssignmentFileConfig>,
    pub pipeline: Option<PipelineFileConfig>,
    pub debug: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        // Server
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                tracing::trace!(host = ?server.host, "Merging server.host");
                current.host = server.host;
            }
            if server.port.is_some() {
                tracing::trace!(port = ?server.port, "Merging server.port");
                current.port = server.port;
            }
        }

        // Facebook
        if let Some(facebook) = other.facebook {
            let current = self.facebook.get_or_insert_with(FacebookFileConfig::default);
            if facebook.app_secret.is_some() {
                tracing::trace!(app_secret = "***", "Merging facebook.app_secret");
                current.app_secret = facebook.app_secret;
            }
            if facebook.verify_token.is_some() {
                tracing::trace!(verify_token = "***", "Merging facebook.verify_token");
                current.verify_token = facebook.verify_token;
            }
            if facebook.access_token.is_some() {
                tracing::trace!(access_token = "***", "Merging facebook.access_token");
                current.access_token = facebook.access_token;
            }
            if facebook.graph_base.is_some() {
                tracing::trace!(graph_base = ?facebook.graph_base, "Merging facebook.graph_base");
                current.graph_base = facebook.graph_base;
            }
        }

        // Assignment
        if let Some(assignment) = other.assignment {
            let current = self
                .assignment
                .get_or_insert_with(AssignmentFileConfig::default);
            if assignment.max_leads_per_user.is_some() {
                tracing::trace!(
                    max_leads_per_user = ?assignment.max_leads_per_user,
                    "Merging assignment.max_leads_per_user"
                );
                current.max_leads_per_user = assignment.max_leads_per_user;
            }
        }

        // Pipeline
        if let Some(pipeline) = other.pipeline {
            let current = self.pipeline.get_or_insert_with(PipelineFileConfig::default);
            if pipeline.transitions_file.is_some() {
                tracing::trace!(
                    transitions_file = ?pipeline.transitions_file,
                    "Merging pipeline.transitions_file"
                );
                current.transitions_file = pipeline.transitions_file;
            }
        }

        // Debug
        if other.debug.is_some() {
            tracing::trace!(debug = ?other.debug, "Merging debug");
            self.debug = other.debug;
        }
    }
}

// =============================================================================
// Runtime Config Structs
// =============================================================================

/// Server configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Facebook integration configuration (final/runtime)
///
/// All credentials are optional; without them the Facebook webhook
/// surface rejects traffic and only website ingestion is available.
#[derive(Debug, Clone)]
pub struct FacebookConfig {
    pub app_secret: Option<String>,
    pub verify_token: Option<String>,
    pub access_token: Option<String>,
    pub graph_base: String,
}

impl FacebookConfig {
    /// Whether Facebook ingestion is fully configured
    pub fn is_configured(&self) -> bool {
        self.app_secret.is_some() && self.verify_token.is_some() && self.access_token.is_some()
    }
}

/// Assignment configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct AssignmentConfig {
    pub max_leads_per_user: u32,
}

/// Pipeline configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub transitions_file: Option<PathBuf>,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub facebook: FacebookConfig,
    pub assignment: AssignmentConfig,
    pub pipeline: PipelineConfig,
    pub debug: bool,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.leadflow/leadflow.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Load from profile dir (~/.leadflow/leadflow.json) - skip if not exists
        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. Load from CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        // 3. Extract file config values with defaults
        let file_server = file_config.server.unwrap_or_default();
        let file_facebook = file_config.facebook.unwrap_or_default();
        let file_assignment = file_config.assignment.unwrap_or_default();
        let file_pipeline = file_config.pipeline.unwrap_or_default();

        // 4. Layer configs: defaults -> file config -> CLI/env overrides
        let host = cli
            .host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT);

        let facebook = FacebookConfig {
            app_secret: cli.fb_app_secret.clone().or(file_facebook.app_secret),
            verify_token: cli.fb_verify_token.clone().or(file_facebook.verify_token),
            access_token: cli.fb_access_token.clone().or(file_facebook.access_token),
            graph_base: file_facebook
                .graph_base
                .unwrap_or_else(|| FB_GRAPH_BASE.to_string()),
        };

        let assignment = AssignmentConfig {
            max_leads_per_user: cli
                .max_leads_per_user
                .or(file_assignment.max_leads_per_user)
                .unwrap_or(DEFAULT_MAX_LEADS_PER_USER),
        };

        let pipeline = PipelineConfig {
            transitions_file: cli.transitions_file.clone().or_else(|| {
                file_pipeline
                    .transitions_file
                    .map(|p| expand_path(&p))
            }),
        };

        // debug: CLI/env flag takes precedence, then file config, default false
        let debug = cli.debug || file_config.debug.unwrap_or(false);

        let config = Self {
            server: ServerConfig { host, port },
            facebook,
            assignment,
            pipeline,
            debug,
        };

        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            debug = config.debug,
            facebook_configured = config.facebook.is_configured(),
            graph_base = %config.facebook.graph_base,
            max_leads_per_user = config.assignment.max_leads_per_user,
            transitions_file = ?config.pipeline.transitions_file,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        // Host must not be empty
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }

        // Port must be non-zero (port 0 would cause bind failure)
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }

        if self.assignment.max_leads_per_user == 0 {
            anyhow::bail!(
                "Configuration error: assignment.max_leads_per_user must be greater than 0"
            );
        }

        if !self.facebook.graph_base.starts_with("http://")
            && !self.facebook.graph_base.starts_with("https://")
        {
            anyhow::bail!(
                "Configuration error: facebook.graph_base must start with http:// or https://. Got: {}",
                self.facebook.graph_base
            );
        }

        if !self.facebook.is_configured() {
            tracing::warn!(
                "Facebook credentials are not fully configured. \
                 Facebook webhook traffic will be rejected; website ingestion remains available."
            );
        }

        if let Some(ref path) = self.pipeline.transitions_file
            && !path.exists()
        {
            anyhow::bail!(
                "Configuration error: pipeline.transitions_file not found: {}",
                path.display()
            );
        }

        Ok(())
    }
}

/// Get the profile config path (~/.leadflow/leadflow.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

/// Whether a host string binds to all interfaces
pub fn is_all_interfaces(host: &str) -> bool {
    host == "0.0.0.0" || host == "::" || host == "[::]"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
            },
            facebook: FacebookConfig {
                app_secret: Some("secret".to_string()),
                verify_token: Some("verify".to_string()),
                access_token: Some("token".to_string()),
                graph_base: FB_GRAPH_BASE.to_string(),
            },
            assignment: AssignmentConfig {
                max_leads_per_user: DEFAULT_MAX_LEADS_PER_USER,
            },
            pipeline: PipelineConfig {
                transitions_file: None,
            },
            debug: false,
        }
    }

    #[test]
    fn test_file_config_parse_full() {
        let json = r#"{
            "server": { "host": "0.0.0.0", "port": 8080 },
            "facebook": { "app_secret": "s", "verify_token": "v" },
            "assignment": { "max_leads_per_user": 5 },
            "debug": true
        }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        assert_eq!(
            config.server.as_ref().unwrap().host,
            Some("0.0.0.0".to_string())
        );
        assert_eq!(config.server.as_ref().unwrap().port, Some(8080));
        assert_eq!(
            config.facebook.as_ref().unwrap().app_secret,
            Some("s".to_string())
        );
        assert_eq!(
            config.assignment.as_ref().unwrap().max_leads_per_user,
            Some(5)
        );
        assert_eq!(config.debug, Some(true));
    }

    #[test]
    fn test_file_config_unknown_fields_collected() {
        let json = r#"{ "server": {}, "tyop": 1 }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();
        match &config.extra {
            serde_json::Value::Object(map) => assert!(map.contains_key("tyop")),
            other => panic!("Expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_overlay_wins() {
        let mut base: FileConfig = serde_json::from_str(
            r#"{ "server": { "host": "127.0.0.1", "port": 1111 }, "debug": false }"#,
        )
        .unwrap();
        let overlay: FileConfig =
            serde_json::from_str(r#"{ "server": { "port": 2222 }, "debug": true }"#).unwrap();

        base.merge(overlay);

        let server = base.server.unwrap();
        assert_eq!(server.host, Some("127.0.0.1".to_string()));
        assert_eq!(server.port, Some(2222));
        assert_eq!(base.debug, Some(true));
    }

    #[test]
    fn test_merge_facebook_partial() {
        let mut base: FileConfig =
            serde_json::from_str(r#"{ "facebook": { "app_secret": "a", "verify_token": "b" } }"#)
                .unwrap();
        let overlay: FileConfig =
            serde_json::from_str(r#"{ "facebook": { "app_secret": "c" } }"#).unwrap();

        base.merge(overlay);

        let fb = base.facebook.unwrap();
        assert_eq!(fb.app_secret, Some("c".to_string()));
        assert_eq!(fb.verify_token, Some("b".to_string()));
    }

    #[test]
    fn test_validate_rejects_empty_host() {
        let mut config = base_config();
        config.server.host = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = base_config();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_cap() {
        let mut config = base_config();
        config.assignment.max_leads_per_user = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_graph_base() {
        let mut config = base_config();
        config.facebook.graph_base = "graph.facebook.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_allows_missing_facebook_credentials() {
        let mut config = base_config();
        config.facebook.app_secret = None;
        config.facebook.access_token = None;
        assert!(config.validate().is_ok());
        assert!(!config.facebook.is_configured());
    }

    #[test]
    fn test_is_configured_requires_all_credentials() {
        let mut config = base_config();
        assert!(config.facebook.is_configured());
        config.facebook.verify_token = None;
        assert!(!config.facebook.is_configured());
    }
}
