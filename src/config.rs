use clap::ArgAction::Append;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::chat::ChatProvider;

/// Main configuration structure that can be loaded from CLI, config file, or environment
///
/// Example configuration file content
/// # clipchat configuration
///
/// listen_on_port = 5000
/// workspace = "./data"
/// max_upload_size = 2147483648
/// allowed_extensions = ["mp4", "avi", "mov", "mkv", "flv"]
/// permits = 2
///
/// # Encoders used for trimmed clips
/// video_codec = "libx264"
/// audio_codec = "aac"
///
/// # Chat backend: "openai" or "anthropic"
/// chat_provider = "anthropic"
/// chat_model = "claude-3-5-sonnet-latest"
/// chat_max_tokens = 1024
///
/// The API key should come from the `CHAT_API_KEY` environment variable.
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[serde(default)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Port to listen on
    #[arg(short, long, default_value_t = 5000)]
    #[serde(default = "default_port")]
    pub listen_on_port: u16,

    /// Working directory holding the uploads/ and processed/ folders
    #[arg(short = 'w', long, default_value = ".")]
    #[serde(default = "default_workspace")]
    pub workspace: String,

    /// Maximum accepted upload size in bytes
    #[arg(long, default_value_t = default_max_upload_size())]
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,

    /// Accepted upload extensions. Can be specified multiple times.
    #[arg(long = "allowed-extension", action = Append)]
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Number of concurrent probe/trim operations
    #[arg(short, long, default_value_t = default_permits())]
    #[serde(default = "default_permits")]
    pub permits: usize,

    /// Video encoder for trimmed clips
    #[arg(long, default_value = "libx264")]
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Audio encoder for trimmed clips
    #[arg(long, default_value = "aac")]
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Configuration file path
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Chat backend: openai or anthropic
    #[arg(long, default_value = "openai")]
    #[serde(default = "default_chat_provider")]
    pub chat_provider: String,

    /// Base URL of the chat API (defaults depend on the provider)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_api_base: Option<String>,

    /// Chat model name (defaults depend on the provider)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_model: Option<String>,

    /// System prompt sent with every chat message
    #[arg(long, default_value = DEFAULT_SYSTEM_PROMPT)]
    #[serde(default = "default_system_prompt")]
    pub chat_system_prompt: String,

    /// Token limit for a single reply
    #[arg(long, default_value_t = 1024)]
    #[serde(default = "default_chat_max_tokens")]
    pub chat_max_tokens: u32,

    /// Timeout for a chat API call, in seconds
    #[arg(long, default_value_t = 60)]
    #[serde(default = "default_chat_timeout_secs")]
    pub chat_timeout_secs: u64,

    /// Chat API key
    #[arg(long, env = "CHAT_API_KEY", hide_env_values = true)]
    #[serde(skip_serializing)]
    pub chat_api_key: Option<String>,
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_on_port: default_port(),
            workspace: default_workspace(),
            max_upload_size: default_max_upload_size(),
            allowed_extensions: default_allowed_extensions(),
            permits: default_permits(),
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            config: None,
            chat_provider: default_chat_provider(),
            chat_api_base: None,
            chat_model: None,
            chat_system_prompt: default_system_prompt(),
            chat_max_tokens: default_chat_max_tokens(),
            chat_timeout_secs: default_chat_timeout_secs(),
            chat_api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from CLI args, optionally merging with a config file
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Config::parse();

        if let Some(config_path) = &config.config {
            let file_config = Self::from_file(Path::new(config_path))?;
            config = config.merge_with_file(file_config);
        }

        // clap leaves an Append list empty when the flag is absent
        if config.allowed_extensions.is_empty() {
            config.allowed_extensions = default_allowed_extensions();
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge with file config, CLI args take precedence
    fn merge_with_file(mut self, file_config: Config) -> Self {
        if self.listen_on_port == default_port() {
            self.listen_on_port = file_config.listen_on_port;
        }
        if self.workspace == default_workspace() {
            self.workspace = file_config.workspace;
        }
        if self.max_upload_size == default_max_upload_size() {
            self.max_upload_size = file_config.max_upload_size;
        }
        if self.allowed_extensions.is_empty() {
            self.allowed_extensions = file_config.allowed_extensions;
        }
        if self.permits == default_permits() {
            self.permits = file_config.permits;
        }
        if self.video_codec == default_video_codec() {
            self.video_codec = file_config.video_codec;
        }
        if self.audio_codec == default_audio_codec() {
            self.audio_codec = file_config.audio_codec;
        }
        if self.chat_provider == default_chat_provider() {
            self.chat_provider = file_config.chat_provider;
        }
        if self.chat_system_prompt == default_system_prompt() {
            self.chat_system_prompt = file_config.chat_system_prompt;
        }
        if self.chat_max_tokens == default_chat_max_tokens() {
            self.chat_max_tokens = file_config.chat_max_tokens;
        }
        if self.chat_timeout_secs == default_chat_timeout_secs() {
            self.chat_timeout_secs = file_config.chat_timeout_secs;
        }

        // For Option fields, CLI takes precedence if Some
        if self.chat_api_base.is_none() {
            self.chat_api_base = file_config.chat_api_base;
        }
        if self.chat_model.is_none() {
            self.chat_model = file_config.chat_model;
        }
        if self.chat_api_key.is_none() {
            self.chat_api_key = file_config.chat_api_key;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.chat_provider.parse::<ChatProvider>()?;

        if self.max_upload_size == 0 {
            return Err(anyhow::anyhow!("max_upload_size must be greater than 0"));
        }
        if self.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!("allowed_extensions cannot be empty"));
        }
        if let Some(ext) = self
            .allowed_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.'))
            .find(|ext| ext.is_empty() || ext.contains('.') || ext.contains('/'))
        {
            return Err(anyhow::anyhow!(
                "Invalid extension '{ext}', use a bare suffix such as 'mp4'"
            ));
        }
        if self.permits == 0 {
            return Err(anyhow::anyhow!("permits must be at least 1"));
        }
        if self.video_codec.is_empty() || self.audio_codec.is_empty() {
            return Err(anyhow::anyhow!("video_codec and audio_codec cannot be empty"));
        }

        if let Some(api_base) = &self.chat_api_base
            && !api_base.starts_with("http://")
            && !api_base.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "chat_api_base must start with http:// or https://"
            ));
        }

        Ok(())
    }

    /// Lower-cased allow-list, the form the upload handler compares against
    pub fn normalized_extensions(&self) -> Vec<String> {
        let mut exts = self
            .allowed_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect::<Vec<_>>();
        exts.sort_unstable();
        exts.dedup();
        exts
    }
}

// Default value functions
fn default_port() -> u16 {
    5000
}

fn default_workspace() -> String {
    ".".to_string()
}

fn default_max_upload_size() -> u64 {
    2 * 1024 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    ["mp4", "avi", "mov", "mkv", "flv"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_permits() -> usize {
    num_cpus::get().clamp(1, 4)
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_chat_provider() -> String {
    "openai".to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_chat_max_tokens() -> u32 {
    1024
}

fn default_chat_timeout_secs() -> u64 {
    60
}
