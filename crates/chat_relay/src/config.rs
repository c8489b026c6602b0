use crate::cli::Args;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Runtime settings resolved from the command line and environment
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub system_prompt: String,
    pub request_timeout: Duration,
    pub storage_dir: PathBuf,
    pub public_url: String,
}

impl RelayConfig {
    pub fn from_args(args: &Args) -> Self {
        let api_key = args.api_key.clone().filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            warn!("OPENAI_API_KEY is not set, chat requests will fail");
        }

        Self {
            host: args.host.clone(),
            port: args.port,
            api_key,
            base_url: args.base_url.clone(),
            model: args.model.clone(),
            system_prompt: load_system_prompt(&args.system_prompt_file),
            request_timeout: Duration::from_secs(args.request_timeout_secs.max(1)),
            storage_dir: args.storage_dir.clone().unwrap_or_else(default_storage_dir),
            public_url: args
                .public_url
                .clone()
                .unwrap_or_else(|| format!("http://localhost:{}", args.port)),
        }
    }
}

/// Read the system prompt, falling back to a generic one
pub fn load_system_prompt(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(prompt) if !prompt.trim().is_empty() => {
            info!("Loaded system prompt from {}", path.display());
            prompt.trim().to_string()
        }
        Ok(_) => {
            warn!("System prompt file {} is empty, using default", path.display());
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
        Err(e) => {
            warn!(
                "Could not read system prompt file {}: {}, using default",
                path.display(),
                e
            );
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
    }
}

pub fn default_storage_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("chat-relay")
        .join("documents")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_system_prompt_from_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "\nYou write quotes.\n")?;
        assert_eq!(load_system_prompt(&path), "You write quotes.");
        Ok(())
    }

    #[test]
    fn test_system_prompt_fallbacks() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!(
            load_system_prompt(&dir.path().join("missing.txt")),
            DEFAULT_SYSTEM_PROMPT
        );

        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "  \n")?;
        assert_eq!(load_system_prompt(&empty), DEFAULT_SYSTEM_PROMPT);
        Ok(())
    }

    #[test]
    fn test_config_from_args() {
        let args = Args::try_parse_from([
            "test",
            "--port",
            "9000",
            "--api-key",
            "sk-test",
            "--system-prompt-file",
            "/nonexistent/prompt.txt",
            "--storage-dir",
            "/tmp/relay-docs",
            "--request-timeout-secs",
            "5",
        ])
        .unwrap();

        let config = RelayConfig::from_args(&args);
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.public_url, "http://localhost:9000");
        assert_eq!(config.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/relay-docs"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_blank_api_key_counts_as_missing() {
        let args = Args::try_parse_from(["test", "--api-key", " "]).unwrap();
        assert_eq!(RelayConfig::from_args(&args).api_key, None);
    }

    #[test]
    fn test_default_storage_dir() {
        assert!(default_storage_dir().ends_with("chat-relay/documents"));
    }
}
