//! Engine and CLI configuration

use crate::auth::{AuthState, DEFAULT_TOKEN_URL};
use crate::llm::DEFAULT_COMPLETIONS_URL;
use clap::Parser;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Per-engine settings, fixed for every run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub model: String,
    /// Cap on request/response rounds per run
    pub max_iterations: u32,
    /// Operator instruction sent before the built-in one; ignored when blank
    pub custom_system_prompt: String,
    pub completions_url: String,
    pub token_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            custom_system_prompt: String::new(),
            completions_url: DEFAULT_COMPLETIONS_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid auth file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Cannot open vault {path}: {source}")]
    Vault {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("HOME is not set; pass --auth-file")]
    NoHome,
}

/// Chat with GitHub Copilot about a folder of notes
#[derive(Debug, Parser)]
#[command(name = "vault-copilot", version, about)]
pub struct Cli {
    /// Vault root folder
    #[arg(long, env = "VAULT_COPILOT_VAULT", default_value = ".")]
    pub vault: PathBuf,

    /// Model identifier
    #[arg(long, env = "VAULT_COPILOT_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Maximum request/response rounds per message
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: u32,

    /// Extra system instruction sent before the built-in one
    #[arg(long, default_value = "")]
    pub system_prompt: String,

    /// Auth state file [default: $HOME/.vault-copilot/auth.json]
    #[arg(long)]
    pub auth_file: Option<PathBuf>,

    /// Vault-relative path of the file treated as currently open
    #[arg(long)]
    pub active_file: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Chat completions endpoint
    #[arg(long, env = "VAULT_COPILOT_COMPLETIONS_URL", default_value = DEFAULT_COMPLETIONS_URL, hide = true)]
    pub completions_url: String,

    /// Token exchange endpoint
    #[arg(long, env = "VAULT_COPILOT_TOKEN_URL", default_value = DEFAULT_TOKEN_URL, hide = true)]
    pub token_url: String,
}

impl Cli {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            model: self.model.clone(),
            max_iterations: self.max_iterations,
            custom_system_prompt: self.system_prompt.clone(),
            completions_url: self.completions_url.clone(),
            token_url: self.token_url.clone(),
        }
    }

    pub fn auth_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.auth_file {
            return Ok(path.clone());
        }
        let home = std::env::var_os("HOME").ok_or(ConfigError::NoHome)?;
        Ok(PathBuf::from(home).join(".vault-copilot").join("auth.json"))
    }
}

/// Load persisted auth state; a missing file yields `GITHUB_TOKEN` or nothing
pub fn load_auth(path: &Path) -> Result<AuthState, ConfigError> {
    load_auth_with(path, std::env::var("GITHUB_TOKEN").ok())
}

fn load_auth_with(path: &Path, env_token: Option<String>) -> Result<AuthState, ConfigError> {
    let mut state = match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str::<AuthState>(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AuthState::default(),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if state.github_token.as_deref().map_or(true, str::is_empty) {
        if let Some(token) = env_token.filter(|t| !t.is_empty()) {
            state.github_token = Some(token);
        }
    }
    Ok(state)
}

/// Persist auth state, creating the parent folder if needed
pub fn save_auth(path: &Path, state: &AuthState) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let json = serde_json::to_string_pretty(state).map_err(|e| write_err(e.into()))?;
    std::fs::write(path, json).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_iterations, 10);
        assert!(config.custom_system_prompt.is_empty());
        assert_eq!(
            config.completions_url,
            "https://api.githubcopilot.com/chat/completions"
        );
    }

    #[test]
    fn test_cli_flags_map_to_config() {
        let cli = Cli::parse_from([
            "vault-copilot",
            "--vault",
            "/notes",
            "--model",
            "gpt-4.1",
            "--max-iterations",
            "3",
            "--system-prompt",
            "Be brief",
        ]);
        let config = cli.engine_config();
        assert_eq!(cli.vault, PathBuf::from("/notes"));
        assert_eq!(config.model, "gpt-4.1");
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.custom_system_prompt, "Be brief");
    }

    #[test]
    fn test_explicit_auth_file_wins() {
        let cli = Cli::parse_from(["vault-copilot", "--auth-file", "/tmp/a.json"]);
        assert_eq!(cli.auth_path().unwrap(), PathBuf::from("/tmp/a.json"));
    }

    #[test]
    fn test_missing_auth_file_falls_back_to_env_token() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth.json");
        let state = load_auth_with(&path, Some("gh".into())).unwrap();
        assert_eq!(state.github_token.as_deref(), Some("gh"));

        let empty = load_auth_with(&path, None).unwrap();
        assert_eq!(empty, AuthState::default());
    }

    #[test]
    fn test_auth_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/auth.json");
        let state = AuthState {
            github_token: Some("gh".into()),
            access_token: Some("tok".into()),
            expires_at: Some(chrono::Utc::now()),
        };
        save_auth(&path, &state).unwrap();
        assert_eq!(load_auth_with(&path, Some("other".into())).unwrap(), state);
    }

    #[test]
    fn test_corrupt_auth_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            load_auth_with(&path, None),
            Err(ConfigError::Parse { .. })
        ));
    }
}
