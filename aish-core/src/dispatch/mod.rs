//! Turns a command line into unit executions.
//!
//! A line is split on `;` (keep going after failures) or `&&` (stop at the
//! first unit that does not succeed). Each unit goes to the first matching
//! built-in, or to the runner followed by the error policy in [`policy`].

pub mod policy;

use std::sync::Arc;

use aish_bash_runner::{ExecutionResult, INTERRUPT_MARKER};
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use crate::builtins::{BuiltinOutcome, BuiltinRegistry};
use crate::chain::{split_on_double_ampersand, split_on_semicolons, transform_multiline};
use crate::context::ShellContext;
use crate::ui::{error_text, style, warning_text};
use policy::Verdict;

/// Nesting limit for follow-ups, corrections and alias expansion.
pub const MAX_DEPTH: usize = 10;

pub const WARN_CONFIRM_PROMPT: &str = "Are you sure you want to execute this command?";
pub const EXPLAIN_PROMPT: &str = "More information about error?";
pub const NO_EXPLANATION: &str = "No explanation provided.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    CommandNotFound,
    PathNotFound,
    Generic,
    LaunchFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Declined,
    Interrupted,
    DepthExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Success { stdout: String },
    Failed { kind: FailureKind, message: String },
    Aborted { reason: AbortReason, message: String },
}

impl DispatchOutcome {
    fn empty_success() -> Self {
        DispatchOutcome::Success {
            stdout: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success { .. })
    }

    /// Aborts end a `;` chain; plain failures do not.
    pub fn is_abort(&self) -> bool {
        matches!(self, DispatchOutcome::Aborted { .. })
    }
}

pub struct CommandDispatcher {
    ctx: Arc<ShellContext>,
    builtins: BuiltinRegistry,
}

impl CommandDispatcher {
    pub fn new(ctx: Arc<ShellContext>) -> Self {
        Self {
            ctx,
            builtins: BuiltinRegistry::standard(),
        }
    }

    pub fn context(&self) -> &Arc<ShellContext> {
        &self.ctx
    }

    pub async fn execute(&self, line: &str) -> DispatchOutcome {
        self.execute_at(line, 0).await
    }

    pub fn execute_at<'a>(&'a self, line: &'a str, depth: usize) -> BoxFuture<'a, DispatchOutcome> {
        async move {
            if depth > MAX_DEPTH {
                let message = format!("Maximum command nesting depth ({MAX_DEPTH}) exceeded");
                eprintln!("{}", error_text(&message));
                return DispatchOutcome::Aborted {
                    reason: AbortReason::DepthExceeded,
                    message,
                };
            }

            let text = transform_multiline(line);
            let text = text.trim();
            if text.is_empty() {
                return DispatchOutcome::empty_success();
            }

            // Quoted or escaped `;` leaves a single unit.
            let units = split_on_semicolons(text);
            if units.len() <= 1 {
                return match units.first() {
                    Some(unit) => self.run_and_chain(unit, depth).await,
                    None => DispatchOutcome::empty_success(),
                };
            }

            let mut last = DispatchOutcome::empty_success();
            for unit in &units {
                last = self.run_and_chain(unit, depth).await;
                if last.is_abort() {
                    debug!(%unit, "stopping ; chain");
                    break;
                }
            }
            last
        }
        .boxed()
    }

    /// Run a `;`-free segment: an `&&` chain when it has no pipe, otherwise
    /// one unit.
    async fn run_and_chain(&self, segment: &str, depth: usize) -> DispatchOutcome {
        if !segment.contains("&&") || segment.contains('|') {
            return self.run_unit(segment, depth).await;
        }
        let mut last = DispatchOutcome::empty_success();
        for unit in split_on_double_ampersand(segment) {
            last = self.run_unit(&unit, depth).await;
            if !last.is_success() {
                debug!(%unit, "stopping && chain");
                break;
            }
        }
        last
    }

    async fn run_unit(&self, unit: &str, depth: usize) -> DispatchOutcome {
        let Some(builtin) = self.builtins.find_handler(unit, &self.ctx) else {
            return self.run_external(unit, depth).await;
        };
        debug!(builtin = builtin.name(), %unit, "dispatching to built-in");
        match builtin.execute(unit, &self.ctx).await {
            Ok(BuiltinOutcome::Handled) => DispatchOutcome::empty_success(),
            Ok(BuiltinOutcome::HandledWithFollowup(followup)) => {
                self.execute_at(&followup, depth + 1).await
            }
            Ok(BuiltinOutcome::NotHandled) => self.run_external(unit, depth).await,
            Err(err) => {
                let message = format!("{err:#}");
                eprintln!("{}", error_text(&message));
                DispatchOutcome::Failed {
                    kind: FailureKind::Generic,
                    message,
                }
            }
        }
    }

    async fn run_external(&self, unit: &str, depth: usize) -> DispatchOutcome {
        let config = &self.ctx.config;
        if config.warn_list.matches(unit) && !config.prompt_ai_commands {
            eprintln!("{}", warning_text(&format!("'{unit}' is on the warn list.")));
            if !self.ctx.prompter.confirm(WARN_CONFIRM_PROMPT) {
                let message = format!("Command '{unit}' not executed by user choice");
                println!("{}", style(&message).yellow());
                return DispatchOutcome::Aborted {
                    reason: AbortReason::Declined,
                    message,
                };
            }
        }

        let result = self.ctx.runner.run(unit).await;
        self.apply_policy(unit, result, depth).await
    }

    async fn apply_policy(&self, unit: &str, result: ExecutionResult, depth: usize) -> DispatchOutcome {
        let verdict = policy::classify(unit, &result, self.ctx.config.ignore_errors);
        debug!(%unit, exit_code = result.exit_code, ?verdict, "classified result");
        let stderr = result.stderr.trim();
        let show_stderr = || {
            if !result.streamed && !stderr.is_empty() {
                eprintln!("{}", error_text(stderr));
            }
        };

        match verdict {
            Verdict::Success => {
                self.ctx.outputs.lock().record(unit, &result.stdout);
                DispatchOutcome::Success {
                    stdout: result.stdout,
                }
            }
            Verdict::SshNotice => {
                if !result.streamed {
                    println!("{stderr}");
                }
                self.ctx.outputs.lock().record(unit, &result.stdout);
                DispatchOutcome::Success {
                    stdout: result.stdout,
                }
            }
            Verdict::Interrupted => {
                if result.streamed {
                    eprintln!("{}", warning_text(INTERRUPT_MARKER));
                } else {
                    eprintln!("{}", warning_text(stderr));
                }
                DispatchOutcome::Aborted {
                    reason: AbortReason::Interrupted,
                    message: INTERRUPT_MARKER.to_owned(),
                }
            }
            Verdict::LaunchFailed => {
                show_stderr();
                DispatchOutcome::Failed {
                    kind: FailureKind::LaunchFailed,
                    message: stderr.to_owned(),
                }
            }
            Verdict::CommandNotFound { name } => {
                show_stderr();
                self.offer_correction(unit, &name, depth).await
            }
            Verdict::PathNotFound => {
                show_stderr();
                DispatchOutcome::Failed {
                    kind: FailureKind::PathNotFound,
                    message: stderr.to_owned(),
                }
            }
            Verdict::Failed {
                message,
                offer_explanation,
            } => {
                if stderr.is_empty() {
                    eprintln!("{}", error_text(&message));
                } else {
                    show_stderr();
                }
                if offer_explanation {
                    self.offer_explanation(unit, &message).await;
                }
                DispatchOutcome::Failed {
                    kind: FailureKind::Generic,
                    message,
                }
            }
        }
    }

    async fn offer_correction(&self, unit: &str, name: &str, depth: usize) -> DispatchOutcome {
        let failed = DispatchOutcome::Failed {
            kind: FailureKind::CommandNotFound,
            message: format!("{name}: command not found"),
        };
        let Some(corrected) = self.ctx.assistant.suggest_similar_command(name).await else {
            return failed;
        };
        let corrected_unit = unit.replacen(name, &corrected, 1);
        let prompt = format!("Did you mean '{corrected}'? Run this command instead?");
        if corrected_unit == unit || !self.ctx.prompter.confirm(&prompt) {
            return failed;
        }
        self.execute_at(&corrected_unit, depth + 1).await
    }

    async fn offer_explanation(&self, unit: &str, message: &str) {
        if !self.ctx.prompter.confirm(EXPLAIN_PROMPT) {
            return;
        }
        let explanation = self
            .ctx
            .assistant
            .explain_failure(unit, message)
            .await
            .unwrap_or_else(|| NO_EXPLANATION.to_owned());
        println!("{}", style(explanation).cyan());
    }
}
