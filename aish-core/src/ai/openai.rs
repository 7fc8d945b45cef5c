use std::collections::VecDeque;
use std::time::Duration;

use aish_config::AiConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::AiAssistant;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Question/answer messages kept as context for `?` questions.
const CONVERSATION_WINDOW: usize = 10;

const GENERATE_SYSTEM_PROMPT: &str =
    "You are a Linux guru, who uses very few words to answer the question. \
     Reply with a single shell command and nothing else.";
const GENERATE_EXAMPLES: &[(&str, &str)] = &[
    ("list files", "ls -l"),
    ("list all files including hidden ones", "ls -la"),
    ("delete all files in this directory", "rm *"),
    ("count how many times apple appears in fruit.txt", "grep -o 'apple' fruit.txt | wc -l"),
];
const SUGGEST_SYSTEM_PROMPT: &str = "You fix mistyped shell commands. \
     Respond with ONLY the command name, or NONE when there is no close match.";
const EXPLAIN_SYSTEM_PROMPT: &str =
    "You are a Linux expert. Answer in at most three short sentences.";
const DESCRIBE_SYSTEM_PROMPT: &str = "You are a Linux command explainer. Given a command, \
     describe the base command in one line, then list each flag with a short explanation \
     under 'Flags:', then the role of any arguments under 'Arguments:'. \
     Keep it brief and practical.";
const DESCRIBE_MAX_TOKENS: u32 = 500;

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("request to assistant failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("assistant returned HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("assistant returned an empty response")]
    EmptyResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_owned(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Client for any OpenAI-compatible `chat/completions` endpoint.
pub struct OpenAiAssistant {
    http_client: HttpClient,
    api_key: String,
    base_url: String,
    model: String,
    partner: String,
    conversation: Mutex<VecDeque<ChatMessage>>,
}

impl OpenAiAssistant {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        partner: impl Into<String>,
    ) -> Result<Self> {
        let http_client = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http_client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            model: model.into(),
            partner: partner.into(),
            conversation: Mutex::new(VecDeque::new()),
        })
    }

    pub fn from_config(config: &AiConfig) -> Result<Self> {
        Self::new(
            config.api_key.clone().unwrap_or_default(),
            &config.base_url,
            &config.model,
            &config.partner,
        )
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: Option<f32>,
    ) -> Result<String, AiError> {
        self.complete_with_limit(messages, temperature, None).await
    }

    async fn complete_with_limit(
        &self,
        messages: &[ChatMessage],
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Result<String, AiError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(%url, model = %self.model, messages = messages.len(), "sending chat request");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages,
                temperature,
                max_tokens,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_owned())
            .filter(|content| !content.is_empty())
            .ok_or(AiError::EmptyResponse)
    }

    fn generation_messages(request: &str) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::new("system", GENERATE_SYSTEM_PROMPT)];
        for (question, command) in GENERATE_EXAMPLES {
            messages.push(ChatMessage::new("user", *question));
            messages.push(ChatMessage::new("assistant", *command));
        }
        messages.push(ChatMessage::new("user", request));
        messages
    }
}

#[async_trait]
impl AiAssistant for OpenAiAssistant {
    async fn suggest_similar_command(&self, name: &str) -> Option<String> {
        let messages = [
            ChatMessage::new("system", SUGGEST_SYSTEM_PROMPT),
            ChatMessage::new(
                "user",
                format!("Which command did I mean when I typed '{name}'?"),
            ),
        ];
        match self.complete(&messages, Some(0.0)).await {
            Ok(answer) => {
                let candidate = answer
                    .split_whitespace()
                    .next()
                    .map(|word| word.trim_matches(|c| c == '`' || c == '\'' || c == '"'))
                    .unwrap_or_default()
                    .to_owned();
                (!candidate.is_empty()
                    && !candidate.eq_ignore_ascii_case("none")
                    && candidate != name)
                    .then_some(candidate)
            }
            Err(err) => {
                warn!(error = %err, "command suggestion failed");
                None
            }
        }
    }

    async fn explain_failure(&self, command: &str, error: &str) -> Option<String> {
        let messages = [
            ChatMessage::new("system", EXPLAIN_SYSTEM_PROMPT),
            ChatMessage::new(
                "user",
                format!("Briefly explain why the command '{command}' failed with the error = '{error}'?"),
            ),
        ];
        self.complete(&messages, None)
            .await
            .inspect_err(|err| warn!(error = %err, "failure explanation failed"))
            .ok()
    }

    async fn generate_command(&self, request: &str) -> Result<String> {
        let messages = Self::generation_messages(request);
        Ok(self.complete(&messages, Some(0.0)).await?)
    }

    async fn answer_question(&self, question: &str) -> Result<String> {
        let mut messages = vec![ChatMessage::new(
            "system",
            format!("You are {}. Keep answers short and practical.", self.partner),
        )];
        messages.extend(self.conversation.lock().iter().cloned());
        messages.push(ChatMessage::new("user", question));

        let answer = self.complete(&messages, None).await?;

        let mut conversation = self.conversation.lock();
        conversation.push_back(ChatMessage::new("user", question));
        conversation.push_back(ChatMessage::new("assistant", answer.clone()));
        while conversation.len() > CONVERSATION_WINDOW {
            conversation.pop_front();
        }
        Ok(answer)
    }

    async fn describe_command(&self, command: &str) -> Result<String> {
        let messages = [
            ChatMessage::new("system", DESCRIBE_SYSTEM_PROMPT),
            ChatMessage::new("user", format!("Explain this command: {command}")),
        ];
        Ok(self
            .complete_with_limit(&messages, Some(0.2), Some(DESCRIBE_MAX_TOKENS))
            .await?)
    }
}
