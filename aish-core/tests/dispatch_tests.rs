use std::path::Path;
use std::sync::Arc;

use aish_bash_runner::{CommandRunner, ExecutionResult, INTERRUPT_MARKER, INTERRUPTED_EXIT_CODE};
use aish_config::{ShellConfig, WarnList};
use aish_core::dispatch::policy::NO_ERROR_OUTPUT_MESSAGE;
use aish_core::ui::ScriptedPrompter;
use aish_core::{
    AbortReason, AiAssistant, CommandDispatcher, DispatchOutcome, FailureKind, ShellContext,
};
use anyhow::Result;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use serial_test::serial;

/// Runner that records units and answers from a lookup.
#[derive(Default)]
struct RecordingRunner {
    units: Mutex<Vec<String>>,
}

impl RecordingRunner {
    fn units(&self) -> Vec<String> {
        self.units.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, unit: &str) -> ExecutionResult {
        self.units.lock().push(unit.to_owned());
        match unit {
            "false" => ExecutionResult {
                exit_code: 1,
                ..ExecutionResult::default()
            },
            "sleep 100" => ExecutionResult {
                exit_code: INTERRUPTED_EXIT_CODE,
                stderr: format!("\n{INTERRUPT_MARKER}"),
                streamed: true,
                ..ExecutionResult::default()
            },
            "sl" | "sl -l" => ExecutionResult {
                exit_code: 127,
                stderr: "bash: line 1: sl: command not found".into(),
                ..ExecutionResult::default()
            },
            "make" => ExecutionResult {
                exit_code: 2,
                stderr: "make: *** No targets specified".into(),
                ..ExecutionResult::default()
            },
            "noisy" => ExecutionResult {
                exit_code: 0,
                stderr: "fatal-ish warning".into(),
                ..ExecutionResult::default()
            },
            other => ExecutionResult::success(format!("{other}\n")),
        }
    }
}

struct HintingAssistant;

#[async_trait]
impl AiAssistant for HintingAssistant {
    async fn suggest_similar_command(&self, name: &str) -> Option<String> {
        (name == "sl").then(|| "ls".to_owned())
    }

    async fn explain_failure(&self, _command: &str, _error: &str) -> Option<String> {
        None
    }

    async fn generate_command(&self, _request: &str) -> Result<String> {
        Ok("echo generated".into())
    }

    async fn answer_question(&self, _question: &str) -> Result<String> {
        Ok("42".into())
    }

    async fn describe_command(&self, command: &str) -> Result<String> {
        Ok(format!("{command}: described"))
    }
}

fn config(home: &Path) -> ShellConfig {
    ShellConfig::from_lookup(|_| None, Some(home)).unwrap()
}

fn dispatcher(
    config: ShellConfig,
    answers: impl IntoIterator<Item = bool>,
) -> (CommandDispatcher, Arc<RecordingRunner>, Arc<ScriptedPrompter>) {
    let runner = Arc::new(RecordingRunner::default());
    let prompter = Arc::new(ScriptedPrompter::new(answers));
    let ctx = ShellContext::in_memory(config)
        .with_runner(runner.clone())
        .with_prompter(prompter.clone())
        .with_assistant(Arc::new(HintingAssistant));
    (CommandDispatcher::new(Arc::new(ctx)), runner, prompter)
}

#[tokio::test]
async fn semicolon_chain_continues_after_failure() {
    let home = TempDir::new().unwrap();
    let (dispatcher, runner, _) = dispatcher(config(home.path()), []);

    let outcome = dispatcher.execute("false ; echo A").await;
    assert_eq!(runner.units(), ["false", "echo A"]);
    assert_eq!(outcome, DispatchOutcome::Success { stdout: "echo A\n".into() });
}

#[tokio::test]
async fn and_chain_stops_at_first_failure() {
    let home = TempDir::new().unwrap();
    let (dispatcher, runner, prompter) = dispatcher(config(home.path()), [false]);

    let outcome = dispatcher.execute("false && echo A").await;
    assert_eq!(runner.units(), ["false"]);
    assert_eq!(
        outcome,
        DispatchOutcome::Failed {
            kind: FailureKind::Generic,
            message: NO_ERROR_OUTPUT_MESSAGE.into(),
        }
    );
    assert_eq!(prompter.asked(), ["More information about error?"]);
}

#[tokio::test]
async fn pipelines_with_and_stay_one_unit() {
    let home = TempDir::new().unwrap();
    let (dispatcher, runner, _) = dispatcher(config(home.path()), []);

    dispatcher.execute("cat log | grep x && echo ok").await;
    dispatcher.execute("echo \"a;b\"").await;
    dispatcher.execute("echo 1; echo 2 && echo 3").await;
    assert_eq!(
        runner.units(),
        ["cat log | grep x && echo ok", "echo \"a;b\"", "echo 1", "echo 2", "echo 3"]
    );
}

#[tokio::test]
async fn quoted_or_escaped_semicolon_keeps_the_and_chain() {
    let home = TempDir::new().unwrap();
    let (dispatcher, runner, _) = dispatcher(config(home.path()), []);

    let outcome = dispatcher.execute("echo \"a;b\" && echo ok").await;
    assert_eq!(outcome, DispatchOutcome::Success { stdout: "echo ok\n".into() });

    let outcome = dispatcher.execute(r"find . -name x -exec echo {} \; && echo ok").await;
    assert!(outcome.is_success());
    assert_eq!(
        runner.units(),
        [
            "echo \"a;b\"",
            "echo ok",
            r"find . -name x -exec echo {} \;",
            "echo ok"
        ]
    );
}

#[tokio::test]
async fn stderr_on_zero_exit_fails_the_unit() {
    let home = TempDir::new().unwrap();
    let (dispatcher, runner, prompter) = dispatcher(config(home.path()), []);

    assert_eq!(
        dispatcher.execute("noisy").await,
        DispatchOutcome::Failed {
            kind: FailureKind::Generic,
            message: "fatal-ish warning".into(),
        }
    );
    let outcome = dispatcher.execute("noisy && echo next").await;
    assert!(!outcome.is_success());
    assert_eq!(runner.units(), ["noisy", "noisy"]);
    assert!(prompter.asked().is_empty());
}

#[tokio::test]
async fn empty_line_is_a_no_op() {
    let home = TempDir::new().unwrap();
    let (dispatcher, runner, _) = dispatcher(config(home.path()), []);
    assert!(dispatcher.execute("   ").await.is_success());
    assert!(dispatcher.execute(" ; ; ").await.is_success());
    assert!(runner.units().is_empty());
}

#[tokio::test]
async fn interrupted_unit_aborts_the_semicolon_chain() {
    let home = TempDir::new().unwrap();
    let (dispatcher, runner, _) = dispatcher(config(home.path()), []);

    let outcome = dispatcher.execute("sleep 100; echo after").await;
    assert_eq!(runner.units(), ["sleep 100"]);
    assert!(matches!(
        outcome,
        DispatchOutcome::Aborted {
            reason: AbortReason::Interrupted,
            ..
        }
    ));
}

#[tokio::test]
async fn declined_warn_list_command_is_not_run() {
    let home = TempDir::new().unwrap();
    let mut config = config(home.path());
    config.warn_list = WarnList::parse("rm");
    let (dispatcher, runner, prompter) = dispatcher(config, [false]);

    let outcome = dispatcher.execute("rm important.txt").await;
    assert!(runner.units().is_empty());
    assert_eq!(
        outcome,
        DispatchOutcome::Aborted {
            reason: AbortReason::Declined,
            message: "Command 'rm important.txt' not executed by user choice".into(),
        }
    );
    assert_eq!(prompter.asked(), ["Are you sure you want to execute this command?"]);
}

#[tokio::test]
async fn declined_warn_list_command_leaves_file_in_place() {
    let home = TempDir::new().unwrap();
    let target = home.child("keep.txt");
    target.write_str("data").unwrap();

    let mut config = config(home.path());
    config.warn_list = WarnList::parse("rm");
    let prompter = Arc::new(ScriptedPrompter::new([false]));
    let ctx = ShellContext::in_memory(config).with_prompter(prompter.clone());
    let dispatcher = CommandDispatcher::new(Arc::new(ctx));

    let line = format!("rm {}", target.path().display());
    let outcome = dispatcher.execute(&line).await;
    assert!(outcome.is_abort());
    assert!(target.path().exists());
}

#[tokio::test]
async fn prompt_ai_commands_skips_the_warn_prompt() {
    let home = TempDir::new().unwrap();
    let mut config = config(home.path());
    config.warn_list = WarnList::All;
    config.prompt_ai_commands = true;
    let (dispatcher, runner, prompter) = dispatcher(config, []);

    assert!(dispatcher.execute("echo hi").await.is_success());
    assert_eq!(runner.units(), ["echo hi"]);
    assert!(prompter.asked().is_empty());
}

#[tokio::test]
async fn accepted_correction_reruns_the_fixed_unit() {
    let home = TempDir::new().unwrap();
    let (dispatcher, runner, prompter) = dispatcher(config(home.path()), [true]);

    let outcome = dispatcher.execute("sl -l").await;
    assert_eq!(runner.units(), ["sl -l", "ls -l"]);
    assert!(outcome.is_success());
    assert_eq!(prompter.asked(), ["Did you mean 'ls'? Run this command instead?"]);
}

#[tokio::test]
async fn declined_correction_is_a_not_found_failure() {
    let home = TempDir::new().unwrap();
    let (dispatcher, _, _) = dispatcher(config(home.path()), [false]);

    assert_eq!(
        dispatcher.execute("sl").await,
        DispatchOutcome::Failed {
            kind: FailureKind::CommandNotFound,
            message: "sl: command not found".into(),
        }
    );
}

#[tokio::test]
async fn ignore_errors_suppresses_explanation_offer() {
    let home = TempDir::new().unwrap();
    let mut config = config(home.path());
    config.ignore_errors = true;
    let (dispatcher, _, prompter) = dispatcher(config, []);

    let outcome = dispatcher.execute("make").await;
    assert!(matches!(
        outcome,
        DispatchOutcome::Failed {
            kind: FailureKind::Generic,
            ..
        }
    ));
    assert!(prompter.asked().is_empty());
}

#[tokio::test]
async fn generated_command_runs_as_followup() {
    let home = TempDir::new().unwrap();
    let (dispatcher, runner, _) = dispatcher(config(home.path()), []);

    assert!(dispatcher.execute("# say something").await.is_success());
    assert_eq!(runner.units(), ["echo generated"]);
}

#[tokio::test]
async fn successful_output_is_captured() {
    let home = TempDir::new().unwrap();
    let (dispatcher, _, _) = dispatcher(config(home.path()), []);

    dispatcher.execute("whoami").await;
    let outputs = dispatcher.context().outputs.lock();
    assert_eq!(outputs.get(0).map(|entry| entry.output.as_str()), Some("whoami"));
}

#[tokio::test]
async fn cyclic_aliases_hit_the_depth_limit() {
    let home = TempDir::new().unwrap();
    let (dispatcher, runner, _) = dispatcher(config(home.path()), []);

    dispatcher.execute("alias ping='pong'").await;
    dispatcher.execute("alias pong='ping'").await;
    let outcome = dispatcher.execute("ping").await;
    assert!(matches!(
        outcome,
        DispatchOutcome::Aborted {
            reason: AbortReason::DepthExceeded,
            ..
        }
    ));
    assert!(runner.units().is_empty());
}

#[tokio::test]
async fn builtin_errors_become_generic_failures() {
    let home = TempDir::new().unwrap();
    let (dispatcher, _, _) = dispatcher(config(home.path()), []);

    let outcome = dispatcher.execute("export 9=x").await;
    assert!(matches!(
        outcome,
        DispatchOutcome::Failed {
            kind: FailureKind::Generic,
            ..
        }
    ));
}

#[tokio::test]
#[serial]
async fn cd_and_command_share_one_line() {
    let original = std::env::current_dir().unwrap();
    let home = TempDir::new().unwrap();
    home.child("project").create_dir_all().unwrap();
    let ctx = ShellContext::in_memory(config(home.path()));
    let dispatcher = CommandDispatcher::new(Arc::new(ctx));

    let line = format!("cd {} && pwd", home.child("project").path().display());
    let outcome = dispatcher.execute(&line).await;
    std::env::set_current_dir(original).unwrap();

    let DispatchOutcome::Success { stdout } = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(
        Path::new(stdout.trim()).canonicalize().unwrap(),
        home.child("project").path().canonicalize().unwrap()
    );
}
