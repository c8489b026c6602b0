use clap::Parser;
use std::path::PathBuf;

/// Define the application arguments
#[derive(Parser, Debug)]
#[command(version, about = "Relays streamed model responses to WebSocket clients", long_about = None)]
pub struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8000)]
    pub port: u16,

    /// Enable verbose logging (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Model name sent to the provider
    #[arg(short = 'm', long, env = "CHAT_RELAY_MODEL", default_value = "gpt-4o")]
    pub model: String,

    /// API base URL of the OpenAI-compatible provider
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub base_url: String,

    /// API key for the provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// File containing the system prompt
    #[arg(long, default_value = "prompt.txt")]
    pub system_prompt_file: PathBuf,

    /// Timeout in seconds for upstream requests and between streamed chunks
    #[arg(long, default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Directory for generated documents
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Base URL under which this server is reachable, used in download links
    #[arg(long)]
    pub public_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args_parsing() {
        let args = Args::try_parse_from(["test"]).expect("Failed to parse default args");

        assert_eq!(args.host, "0.0.0.0");
        assert_eq!(args.port, 8000);
        assert_eq!(args.verbose, 0);
        assert_eq!(args.system_prompt_file, PathBuf::from("prompt.txt"));
        assert_eq!(args.request_timeout_secs, 30);
        assert!(args.storage_dir.is_none());
        assert!(args.public_url.is_none());
    }

    #[test]
    fn test_verbose_flag_counting() {
        let args = Args::try_parse_from(["test", "-vv"]).expect("Failed to parse verbose args");
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_explicit_values() {
        let args = Args::try_parse_from([
            "test",
            "--port",
            "9100",
            "--model",
            "gpt-4o-mini",
            "--base-url",
            "http://localhost:11434/v1",
            "--storage-dir",
            "/tmp/docs",
            "--public-url",
            "https://relay.example.com",
        ])
        .expect("Failed to parse args");

        assert_eq!(args.port, 9100);
        assert_eq!(args.model, "gpt-4o-mini");
        assert_eq!(args.base_url, "http://localhost:11434/v1");
        assert_eq!(args.storage_dir, Some(PathBuf::from("/tmp/docs")));
        assert_eq!(args.public_url.as_deref(), Some("https://relay.example.com"));
    }
}
