/// Configuration keys, read from the rc file and the process environment
pub mod keys {
    pub const WARN_LIST: &str = "WARN_LIST";
    pub const INTERACTIVE_LIST: &str = "INTERACTIVE_LIST";
    pub const IGNORE_ERRORS: &str = "IGNORE_ERRORS";
    pub const PROMPT_AI_COMMANDS: &str = "PROMPT_AI_COMMANDS";
    pub const FORCE_COLOR_OUTPUT: &str = "FORCE_COLOR_OUTPUT";
    pub const JOB_MONITOR_INTERVAL_MS: &str = "JOB_MONITOR_INTERVAL_MS";
    pub const SHELL: &str = "AISH_SHELL";
    pub const DEBUG: &str = "AISH_DEBUG";

    pub const AI_API_KEY: &str = "AI_API_KEY";
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const AI_BASE_URL: &str = "AI_BASE_URL";
    pub const AI_MODEL: &str = "AI_MODEL";
    pub const AI_PARTNER: &str = "AI_PARTNER";

    pub const HISTORY_FILE: &str = "HISTORY_FILE";
    pub const HISTORY_LIMIT: &str = "HISTORY_LIMIT";
    pub const ALIASES_FILE: &str = "ALIASES_FILE";
}

pub mod defaults {
    pub const RC_FILE_NAME: &str = ".aish";
    pub const HISTORY_FILE_NAME: &str = ".aish_history";
    pub const HISTORY_LIMIT: usize = 1000;
    pub const ALIASES_FILE_NAME: &str = ".aish_aliases";

    pub const JOB_MONITOR_INTERVAL_MS: u64 = 1000;
    pub const SHELL: &str = "/bin/bash";

    pub const AI_BASE_URL: &str = "https://api.openai.com/v1";
    pub const AI_MODEL: &str = "gpt-4o-mini";
    pub const AI_PARTNER: &str = "a helpful Linux expert";
}
