//! Assistant used for command generation, questions and failure hints.
//!
//! The dispatcher treats the assistant as advisory: suggestion and
//! explanation return `Option` and a missing answer never blocks execution.

mod openai;

use std::sync::Arc;

use aish_config::AiConfig;
use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::debug;

pub use openai::{AiError, OpenAiAssistant};

#[async_trait]
pub trait AiAssistant: Send + Sync {
    /// Replacement for a program name the shell could not find.
    async fn suggest_similar_command(&self, name: &str) -> Option<String>;

    /// Short explanation of why `command` failed with `error`.
    async fn explain_failure(&self, command: &str, error: &str) -> Option<String>;

    /// Raw response for a natural-language command request.
    async fn generate_command(&self, request: &str) -> Result<String>;

    async fn answer_question(&self, question: &str) -> Result<String>;

    /// Describe what `command` and each of its flags do, without running it.
    async fn describe_command(&self, command: &str) -> Result<String>;
}

const DISABLED_HINT: &str = "AI assistant is not configured; set AI_API_KEY to enable it";

/// Assistant used when no API key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAssistant;

#[async_trait]
impl AiAssistant for DisabledAssistant {
    async fn suggest_similar_command(&self, _name: &str) -> Option<String> {
        None
    }

    async fn explain_failure(&self, _command: &str, _error: &str) -> Option<String> {
        None
    }

    async fn generate_command(&self, _request: &str) -> Result<String> {
        bail!(DISABLED_HINT)
    }

    async fn answer_question(&self, _question: &str) -> Result<String> {
        bail!(DISABLED_HINT)
    }

    async fn describe_command(&self, _command: &str) -> Result<String> {
        bail!(DISABLED_HINT)
    }
}

/// HTTP assistant when a key is present, otherwise [`DisabledAssistant`].
pub fn from_config(config: &AiConfig) -> Result<Arc<dyn AiAssistant>> {
    match &config.api_key {
        Some(_) => Ok(Arc::new(OpenAiAssistant::from_config(config)?)),
        None => {
            debug!("no API key configured, assistant disabled");
            Ok(Arc::new(DisabledAssistant))
        }
    }
}

/// Pick the command out of a generation response.
///
/// Code fences and `#` comment lines are skipped and the last remaining line
/// wins. `None` means the response holds no runnable command.
pub fn extract_command(response: &str) -> Option<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("```"))
        .next_back()
        .map(|line| line.trim_matches('`').trim().to_owned())
        .filter(|line| !line.is_empty())
}
