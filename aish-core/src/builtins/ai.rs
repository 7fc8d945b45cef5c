use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::debug;

use super::{BuiltinCommand, BuiltinOutcome, is_verb, verb_args};
use crate::ai::extract_command;
use crate::context::ShellContext;
use crate::ui::style;

/// `#<request>` generates and runs a command; `##<request>` only prints the
/// answer as a comment.
pub(super) struct GenerateCommand;

fn print_as_comment(text: &str) {
    for line in text.lines() {
        let line = line.trim_start_matches('#').trim();
        if !line.is_empty() {
            println!("{}", style(format!("# {line}")).dimmed());
        }
    }
}

impl GenerateCommand {
    fn request(unit: &str, ctx: &ShellContext) -> Result<String> {
        let request = unit.trim().trim_start_matches('#').trim();
        if request.is_empty() {
            bail!("Usage: #<what you want to do>");
        }
        Ok(ctx
            .outputs
            .lock()
            .expand_references(request)
            .unwrap_or_else(|| request.to_owned()))
    }
}

#[async_trait]
impl BuiltinCommand for GenerateCommand {
    fn name(&self) -> &'static str {
        "#"
    }

    fn matches(&self, unit: &str, _ctx: &ShellContext) -> bool {
        unit.trim_start().starts_with('#')
    }

    async fn execute(&self, unit: &str, ctx: &ShellContext) -> Result<BuiltinOutcome> {
        let comment_only = unit.trim_start().starts_with("##");
        let request = Self::request(unit, ctx)?;
        debug!(%request, comment_only, "generating command");

        let response = ctx.assistant.generate_command(&request).await?;
        if comment_only {
            print_as_comment(&response);
            return Ok(BuiltinOutcome::Handled);
        }

        let Some(command) = extract_command(&response) else {
            print_as_comment(&response);
            return Ok(BuiltinOutcome::Handled);
        };
        println!("{}", style(&command).green().bold());

        if ctx.config.prompt_ai_commands && !ctx.prompter.confirm("Execute this command?") {
            println!("{}", style("Command not executed").yellow());
            return Ok(BuiltinOutcome::Handled);
        }
        Ok(BuiltinOutcome::HandledWithFollowup(command))
    }
}

/// `?<question>` asks the assistant and prints the answer.
pub(super) struct AskQuestion;

#[async_trait]
impl BuiltinCommand for AskQuestion {
    fn name(&self) -> &'static str {
        "?"
    }

    fn matches(&self, unit: &str, _ctx: &ShellContext) -> bool {
        unit.trim_start().starts_with('?')
    }

    async fn execute(&self, unit: &str, ctx: &ShellContext) -> Result<BuiltinOutcome> {
        let question = unit.trim().trim_start_matches('?').trim();
        if question.is_empty() {
            bail!("Usage: ?<question>");
        }
        let question = ctx
            .outputs
            .lock()
            .expand_references(question)
            .unwrap_or_else(|| question.to_owned());
        let answer = ctx.assistant.answer_question(&question).await?;
        println!("{}", style(answer).cyan());
        Ok(BuiltinOutcome::Handled)
    }
}

/// `explain <command>` describes a command and its flags without running it.
pub(super) struct ExplainCommand;

#[async_trait]
impl BuiltinCommand for ExplainCommand {
    fn name(&self) -> &'static str {
        "explain"
    }

    fn matches(&self, unit: &str, _ctx: &ShellContext) -> bool {
        is_verb(unit, "explain")
    }

    async fn execute(&self, unit: &str, ctx: &ShellContext) -> Result<BuiltinOutcome> {
        let command = verb_args(unit, "explain").unwrap_or_default();
        if command.is_empty() {
            bail!("Usage: explain <command>, e.g. explain tar -xzvf archive.tar.gz");
        }
        let description = ctx.assistant.describe_command(command).await?;
        println!(
            "\n{} {}",
            style("Command:").blue().bold(),
            style(command).bold()
        );
        println!("{}", style("-".repeat(50)).blue());
        println!("{description}\n");
        Ok(BuiltinOutcome::Handled)
    }
}
