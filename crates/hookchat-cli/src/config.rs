//! Configuration file support

use hookchat_core::WidgetConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for hookchat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Whether to use TUI mode by default
    pub tui: Option<bool>,
    /// Widget settings, at the top level of the file
    #[serde(flatten)]
    pub widget: WidgetConfig,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hookchat")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("HOOKCHAT_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from a file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Write the example config if no config file exists yet
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, example_config())?;
        Ok(path)
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r##"# hookchat configuration file
# Place at ~/.config/hookchat/config.toml (Linux) or set HOOKCHAT_CONFIG_PATH

# Whether to use TUI mode by default
tui = true

# Delay before loading messages start, and time between them (milliseconds)
loading_message_delay_ms = 5000
loading_message_interval_ms = 3000

# Verbose logging to stderr
debug = false

[webhook]
url = "https://example.com/webhook/chat"
route = "general"
# Ask for a streamed answer
streaming = true
# Give up after this many milliseconds (0 waits forever)
timeout_ms = 0

[branding]
name = "Assistant"
welcome_text = "Hello! 👋 How can I help you today?"
response_time_text = "Typically replies in seconds"

[style]
primary_color = "#854fff"
secondary_color = "#6b3fd4"

[labels]
input_placeholder = "Type your message here..."
waiting_for_response = "Waiting for response..."
error_message = "An error occurred while receiving the response."
connection_error_message = "Connection error. Please check your internet connection."

[initial_message]
enabled = true
text = "Hi! Ask me anything."
# Ask the webhook to replay the previous session when there is no local history
load_previous_session = false

[[loading_messages]]
emoji = "💭"
text = "Thinking..."

[[loading_messages]]
emoji = "⏳"
text = "Just a moment..."
"##
}
