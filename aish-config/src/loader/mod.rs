//! Resolve [`ShellConfig`] from the rc file and the environment.
//!
//! The rc file (`~/.aish` unless overridden) holds `KEY=VALUE` lines in
//! dotenv syntax. Process environment variables take precedence over rc
//! values, so a one-off `WARN_LIST=all aish` works without editing the file.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::constants::{defaults, keys};
use crate::error::ConfigError;
use crate::types::{AiConfig, HistoryConfig, ShellConfig, WarnList};

/// `true`, `yes`, `1` and `always` (any case) are truthy; anything else is not.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "1" | "always"
    )
}

pub fn default_rc_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(defaults::RC_FILE_NAME))
}

/// Read `KEY=VALUE` pairs from an rc file. A missing file yields `None`.
pub fn read_rc_file(path: &Path) -> Result<Option<BTreeMap<String, String>>, ConfigError> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(dotenvy::Error::Io(err)) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut values = BTreeMap::new();
    for item in iter {
        let (key, value) = item.map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        values.insert(key, value);
    }
    debug!(path = %path.display(), keys = values.len(), "loaded rc file");
    Ok(Some(values))
}

fn expand_home(value: &str, home: Option<&Path>) -> PathBuf {
    match (value.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => home.join(rest),
        _ if value == "~" => home.map_or_else(|| PathBuf::from(value), Path::to_path_buf),
        _ => PathBuf::from(value),
    }
}

impl ShellConfig {
    /// Load from `rc_override` (which must exist) or the default rc file
    /// (which may be absent), overlaid by the process environment.
    pub fn load(rc_override: Option<&Path>) -> Result<Self, ConfigError> {
        let rc_path = match rc_override {
            Some(path) => Some(path.to_path_buf()),
            None => default_rc_path(),
        };

        let rc_values = match &rc_path {
            Some(path) => read_rc_file(path)?,
            None => None,
        };
        if rc_values.is_none()
            && let Some(path) = rc_override
        {
            return Err(ConfigError::MissingRcFile {
                path: path.to_path_buf(),
            });
        }

        let loaded_from = rc_values.as_ref().and(rc_path);
        let rc_values = rc_values.unwrap_or_default();
        let home = dirs::home_dir();
        let mut config = Self::from_lookup(
            |key| std::env::var(key).ok().or_else(|| rc_values.get(key).cloned()),
            home.as_deref(),
        )?;
        config.rc_path = loaded_from;
        Ok(config)
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F, home: Option<&Path>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let flag = |key: &str, default: bool| get(key).map_or(default, |value| parse_bool(&value));

        let job_monitor_interval_ms = match get(keys::JOB_MONITOR_INTERVAL_MS) {
            Some(raw) => parse_positive(keys::JOB_MONITOR_INTERVAL_MS, &raw)?,
            None => defaults::JOB_MONITOR_INTERVAL_MS,
        };
        let history_limit = match get(keys::HISTORY_LIMIT) {
            Some(raw) => parse_positive(keys::HISTORY_LIMIT, &raw)? as usize,
            None => defaults::HISTORY_LIMIT,
        };

        let home_file = |key: &str, file_name: &str| match get(key) {
            Some(raw) => Ok(expand_home(&raw, home)),
            None => home
                .map(|home| home.join(file_name))
                .ok_or(ConfigError::NoHomeDirectory),
        };
        let history_file = home_file(keys::HISTORY_FILE, defaults::HISTORY_FILE_NAME)?;
        let aliases_file = home_file(keys::ALIASES_FILE, defaults::ALIASES_FILE_NAME)?;

        Ok(Self {
            warn_list: get(keys::WARN_LIST)
                .map(|raw| WarnList::parse(&raw))
                .unwrap_or_default(),
            interactive_list: get(keys::INTERACTIVE_LIST),
            ignore_errors: flag(keys::IGNORE_ERRORS, false),
            prompt_ai_commands: flag(keys::PROMPT_AI_COMMANDS, false),
            force_color_output: flag(keys::FORCE_COLOR_OUTPUT, true),
            job_monitor_interval: Duration::from_millis(job_monitor_interval_ms),
            shell: get(keys::SHELL)
                .map_or_else(|| PathBuf::from(defaults::SHELL), PathBuf::from),
            debug: flag(keys::DEBUG, false),
            ai: AiConfig {
                api_key: get(keys::AI_API_KEY).or_else(|| get(keys::OPENAI_API_KEY)),
                base_url: get(keys::AI_BASE_URL)
                    .unwrap_or_else(|| defaults::AI_BASE_URL.to_owned()),
                model: get(keys::AI_MODEL).unwrap_or_else(|| defaults::AI_MODEL.to_owned()),
                partner: get(keys::AI_PARTNER).unwrap_or_else(|| defaults::AI_PARTNER.to_owned()),
            },
            history: HistoryConfig {
                file: history_file,
                limit: history_limit,
            },
            aliases_file,
            rc_path: None,
        })
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_owned(),
            reason: "must be greater than zero".into(),
        }),
        Ok(value) => Ok(value),
        Err(err) => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_owned(),
            reason: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests;
