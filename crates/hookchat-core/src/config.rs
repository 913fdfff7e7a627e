//! Widget configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Delay before loading messages start when none is configured
pub const DEFAULT_LOADING_DELAY_MS: u64 = 5000;

/// Interval between loading messages when none is configured
pub const DEFAULT_LOADING_INTERVAL_MS: u64 = 3000;

/// Everything the widget runtime reads from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    pub webhook: WebhookConfig,
    pub branding: Branding,
    pub style: StyleConfig,
    pub labels: Labels,
    pub initial_message: InitialMessage,
    /// Phrases rotated on the typing indicator during long waits
    pub loading_messages: Vec<LoadingMessage>,
    pub loading_message_delay_ms: u64,
    pub loading_message_interval_ms: u64,
    /// Verbose logging
    pub debug: bool,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            webhook: WebhookConfig::default(),
            branding: Branding::default(),
            style: StyleConfig::default(),
            labels: Labels::default(),
            initial_message: InitialMessage::default(),
            loading_messages: default_loading_messages(),
            loading_message_delay_ms: DEFAULT_LOADING_DELAY_MS,
            loading_message_interval_ms: DEFAULT_LOADING_INTERVAL_MS,
            debug: false,
        }
    }
}

impl WidgetConfig {
    /// Config pointing at a webhook, everything else default
    pub fn with_url(url: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.webhook.url = url.into();
        config
    }

    /// Session deadline; `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        match self.webhook.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// How long to wait for a first fragment before loading messages start
    pub fn loading_delay(&self) -> Duration {
        Duration::from_millis(non_zero_or(
            self.loading_message_delay_ms,
            DEFAULT_LOADING_DELAY_MS,
        ))
    }

    /// Time between two loading messages
    pub fn loading_interval(&self) -> Duration {
        Duration::from_millis(non_zero_or(
            self.loading_message_interval_ms,
            DEFAULT_LOADING_INTERVAL_MS,
        ))
    }

    /// Reject configurations the widget cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.webhook.url.trim().is_empty() {
            return Err(Error::InvalidConfig("webhook.url must be set".into()));
        }
        Ok(())
    }
}

fn non_zero_or(value: u64, fallback: u64) -> u64 {
    if value == 0 { fallback } else { value }
}

/// Where and how to reach the webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub url: String,
    pub route: String,
    pub streaming: bool,
    /// Milliseconds; 0 disables the deadline
    pub timeout_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            route: String::new(),
            streaming: true,
            timeout_ms: 0,
        }
    }
}

/// Header texts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Branding {
    pub name: String,
    pub welcome_text: String,
    pub response_time_text: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            name: String::new(),
            welcome_text: "Hello! 👋 How can I help you today?".into(),
            response_time_text: "Typically replies in seconds".into(),
        }
    }
}

/// Colours as `#rrggbb`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub primary_color: String,
    pub secondary_color: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            primary_color: "#854fff".into(),
            secondary_color: "#6b3fd4".into(),
        }
    }
}

/// User-facing strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub input_placeholder: String,
    pub waiting_for_response: String,
    pub error_message: String,
    pub connection_error_message: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            input_placeholder: "Type your message here...".into(),
            waiting_for_response: "Waiting for response...".into(),
            error_message: "An error occurred while receiving the response.".into(),
            connection_error_message: "Connection error. Please check your internet connection."
                .into(),
        }
    }
}

/// What to show when a conversation starts without history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialMessage {
    pub enabled: bool,
    pub text: String,
    /// Ask the webhook to replay the previous session
    pub load_previous_session: bool,
}

impl InitialMessage {
    /// Text to show, if any
    pub fn greeting(&self) -> Option<&str> {
        let text = self.text.trim();
        (self.enabled && !text.is_empty()).then_some(self.text.as_str())
    }
}

/// A loading phrase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingMessage {
    pub emoji: String,
    pub text: String,
}

impl LoadingMessage {
    pub fn new(emoji: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            emoji: emoji.into(),
            text: text.into(),
        }
    }
}

impl std::fmt::Display for LoadingMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.emoji.is_empty() {
            f.write_str(&self.text)
        } else {
            write!(f, "{} {}", self.emoji, self.text)
        }
    }
}

fn default_loading_messages() -> Vec<LoadingMessage> {
    vec![
        LoadingMessage::new("💭", "Thinking..."),
        LoadingMessage::new("🔍", "Processing your request..."),
        LoadingMessage::new("⏳", "Just a moment..."),
        LoadingMessage::new("🎯", "Preparing response..."),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WidgetConfig::default();
        assert!(config.webhook.streaming);
        assert_eq!(config.timeout(), None);
        assert_eq!(config.loading_messages.len(), 4);
        assert_eq!(config.loading_delay(), Duration::from_millis(5000));
        assert_eq!(config.loading_interval(), Duration::from_millis(3000));
        assert_eq!(config.labels.waiting_for_response, "Waiting for response...");
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: WidgetConfig = serde_json::from_str(
            r#"{"webhook": {"url": "http://x", "timeout_ms": 1000}, "labels": {"error_message": "Oops"}}"#,
        )
        .unwrap();
        assert_eq!(config.webhook.url, "http://x");
        assert!(config.webhook.streaming);
        assert_eq!(config.timeout(), Some(Duration::from_millis(1000)));
        assert_eq!(config.labels.error_message, "Oops");
        assert_eq!(config.labels.input_placeholder, "Type your message here...");
    }

    #[test]
    fn test_explicit_empty_loading_messages() {
        let config: WidgetConfig = serde_json::from_str(r#"{"loading_messages": []}"#).unwrap();
        assert!(config.loading_messages.is_empty());
    }

    #[test]
    fn test_zero_durations_fall_back() {
        let config = WidgetConfig {
            loading_message_delay_ms: 0,
            loading_message_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.loading_delay(), Duration::from_millis(5000));
        assert_eq!(config.loading_interval(), Duration::from_millis(3000));
    }

    #[test]
    fn test_validate_requires_url() {
        assert!(WidgetConfig::default().validate().is_err());
        assert!(WidgetConfig::with_url("http://localhost/hook").validate().is_ok());
    }

    #[test]
    fn test_greeting_requires_enabled_and_text() {
        let mut initial = InitialMessage {
            enabled: false,
            text: "Hi".into(),
            load_previous_session: false,
        };
        assert_eq!(initial.greeting(), None);
        initial.enabled = true;
        assert_eq!(initial.greeting(), Some("Hi"));
        initial.text = "  ".into();
        assert_eq!(initial.greeting(), None);
    }

    #[test]
    fn test_loading_message_display() {
        assert_eq!(LoadingMessage::new("💭", "Thinking...").to_string(), "💭 Thinking...");
        assert_eq!(LoadingMessage::new("", "Wait").to_string(), "Wait");
    }
}
