use std::path::PathBuf;
use std::time::Duration;

/// Commands that need confirmation before they run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WarnList {
    /// Confirm every command.
    All,
    /// Confirm commands starting with one of these prefixes.
    Prefixes(Vec<String>),
    #[default]
    Empty,
}

impl WarnList {
    /// Parse `all` or a comma-separated prefix list.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("all") {
            return WarnList::All;
        }
        let prefixes: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|prefix| !prefix.is_empty())
            .map(str::to_owned)
            .collect();
        if prefixes.is_empty() {
            WarnList::Empty
        } else {
            WarnList::Prefixes(prefixes)
        }
    }

    pub fn matches(&self, unit: &str) -> bool {
        let unit = unit.trim_start();
        match self {
            WarnList::All => true,
            WarnList::Prefixes(prefixes) => prefixes.iter().any(|prefix| unit.starts_with(prefix)),
            WarnList::Empty => false,
        }
    }
}

/// Settings for the OpenAI-compatible assistant.
#[derive(Clone, PartialEq, Eq)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Persona used when answering `?` questions.
    pub partner: String,
}

impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("partner", &self.partner)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    pub file: PathBuf,
    pub limit: usize,
}

/// Fully resolved shell settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub warn_list: WarnList,
    /// Raw `INTERACTIVE_LIST`; `None` keeps the built-in list.
    pub interactive_list: Option<String>,
    pub ignore_errors: bool,
    pub prompt_ai_commands: bool,
    pub force_color_output: bool,
    pub job_monitor_interval: Duration,
    pub shell: PathBuf,
    pub debug: bool,
    pub ai: AiConfig,
    pub history: HistoryConfig,
    /// JSON file holding persisted aliases.
    pub aliases_file: PathBuf,
    /// The rc file the settings were read from, if one existed.
    pub rc_path: Option<PathBuf>,
}
