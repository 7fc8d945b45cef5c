use super::*;

use assert_fs::TempDir;
use serial_test::serial;
use std::collections::HashMap;
use std::fs;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_apply_when_nothing_is_set() {
    let config = ShellConfig::from_lookup(lookup_from(&[]), Some(Path::new("/home/u"))).unwrap();
    assert_eq!(config.warn_list, WarnList::Empty);
    assert_eq!(config.interactive_list, None);
    assert!(!config.ignore_errors);
    assert!(!config.prompt_ai_commands);
    assert!(config.force_color_output);
    assert_eq!(config.job_monitor_interval, Duration::from_millis(1000));
    assert_eq!(config.shell, PathBuf::from("/bin/bash"));
    assert_eq!(config.ai.api_key, None);
    assert_eq!(config.ai.model, defaults::AI_MODEL);
    assert_eq!(config.history.file, PathBuf::from("/home/u/.aish_history"));
    assert_eq!(config.history.limit, 1000);
    assert_eq!(config.aliases_file, PathBuf::from("/home/u/.aish_aliases"));
}

#[test]
fn booleans_accept_common_spellings() {
    for truthy in ["true", "YES", "1", "Always", " yes "] {
        assert!(parse_bool(truthy), "{truthy}");
    }
    for falsy in ["false", "no", "0", "", "maybe"] {
        assert!(!parse_bool(falsy), "{falsy}");
    }

    let config = ShellConfig::from_lookup(
        lookup_from(&[
            (keys::IGNORE_ERRORS, "yes"),
            (keys::PROMPT_AI_COMMANDS, "always"),
            (keys::FORCE_COLOR_OUTPUT, "no"),
        ]),
        Some(Path::new("/home/u")),
    )
    .unwrap();
    assert!(config.ignore_errors);
    assert!(config.prompt_ai_commands);
    assert!(!config.force_color_output);
}

#[test]
fn openai_key_is_a_fallback() {
    let home = Some(Path::new("/home/u"));
    let config =
        ShellConfig::from_lookup(lookup_from(&[(keys::OPENAI_API_KEY, "sk-openai")]), home)
            .unwrap();
    assert_eq!(config.ai.api_key.as_deref(), Some("sk-openai"));

    let config = ShellConfig::from_lookup(
        lookup_from(&[(keys::OPENAI_API_KEY, "sk-openai"), (keys::AI_API_KEY, "sk-ai")]),
        home,
    )
    .unwrap();
    assert_eq!(config.ai.api_key.as_deref(), Some("sk-ai"));
}

#[test]
fn invalid_numbers_are_rejected() {
    let err = ShellConfig::from_lookup(
        lookup_from(&[(keys::JOB_MONITOR_INTERVAL_MS, "soon")]),
        Some(Path::new("/home/u")),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidValue {
            key: keys::JOB_MONITOR_INTERVAL_MS,
            ..
        }
    ));

    let err = ShellConfig::from_lookup(
        lookup_from(&[(keys::HISTORY_LIMIT, "0")]),
        Some(Path::new("/home/u")),
    )
    .unwrap_err();
    assert!(err.to_string().contains("greater than zero"));
}

#[test]
fn history_file_expands_tilde() {
    let config = ShellConfig::from_lookup(
        lookup_from(&[(keys::HISTORY_FILE, "~/logs/aish.hist")]),
        Some(Path::new("/home/u")),
    )
    .unwrap();
    assert_eq!(config.history.file, PathBuf::from("/home/u/logs/aish.hist"));
}

#[test]
#[serial]
fn rc_file_values_are_overridden_by_environment() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let rc = dir.path().join("aishrc");
    fs::write(
        &rc,
        "# aish settings\nWARN_LIST=rm,mv\nAI_MODEL=\"local-model\"\nAISH_TEST_ONLY_KEY=1\n",
    )
    .expect("failed to write rc");

    unsafe {
        std::env::set_var(keys::AI_MODEL, "env-model");
        std::env::remove_var(keys::WARN_LIST);
    }
    let config = ShellConfig::load(Some(&rc));
    unsafe {
        std::env::remove_var(keys::AI_MODEL);
    }

    let config = config.expect("config should load");
    assert_eq!(
        config.warn_list,
        WarnList::Prefixes(vec!["rm".into(), "mv".into()])
    );
    assert_eq!(config.ai.model, "env-model");
    assert_eq!(config.rc_path.as_deref(), Some(rc.as_path()));
}

#[test]
#[serial]
fn explicit_rc_file_must_exist() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let missing = dir.path().join("nope");
    let err = ShellConfig::load(Some(&missing)).unwrap_err();
    assert!(matches!(err, ConfigError::MissingRcFile { .. }));
}

#[test]
fn missing_rc_file_reads_as_none() {
    let dir = TempDir::new().expect("failed to create temp dir");
    assert!(read_rc_file(&dir.path().join("absent")).unwrap().is_none());
}

#[test]
fn malformed_rc_file_is_a_parse_error() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let rc = dir.path().join("bad");
    fs::write(&rc, "GOOD=1\nBAD LINE WITHOUT EQUALS\n").expect("failed to write rc");
    let err = read_rc_file(&rc).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}
