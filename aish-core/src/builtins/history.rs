use std::process::Stdio;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{BuiltinCommand, BuiltinOutcome, verb_args};
use crate::context::ShellContext;
use crate::ui::style;

const OUTPUT_LISTING_LINES: usize = 5;

/// `!!`, `!n` and `!prefix` re-run an entry from the command history.
pub(super) struct RecallHistory;

impl RecallHistory {
    fn resolve(designator: &str, ctx: &ShellContext) -> Option<String> {
        let history = ctx.history.lock();
        let found = if designator == "!" {
            history
                .entries()
                .iter()
                .rev()
                .find(|entry| !entry.starts_with('!'))
                .map(String::as_str)
        } else if let Ok(index) = designator.parse::<usize>() {
            history.get(index)
        } else {
            history.find_prefix(designator)
        };
        found.map(str::to_owned)
    }
}

#[async_trait]
impl BuiltinCommand for RecallHistory {
    fn name(&self) -> &'static str {
        "!"
    }

    fn matches(&self, unit: &str, _ctx: &ShellContext) -> bool {
        unit.trim()
            .strip_prefix('!')
            .and_then(|rest| rest.chars().next())
            .is_some_and(|next| !next.is_whitespace() && next != '=')
    }

    async fn execute(&self, unit: &str, ctx: &ShellContext) -> Result<BuiltinOutcome> {
        let unit = unit.trim();
        let designator = &unit[1..];
        let Some(command) = Self::resolve(designator, ctx) else {
            bail!("{unit}: event not found");
        };
        println!("{}", style(&command).dimmed());
        Ok(BuiltinOutcome::HandledWithFollowup(command))
    }
}

/// `history [n]`, also spelled `h`. `history | <filter>` feeds the listing
/// to a shell pipeline.
pub(super) struct ListHistory;

fn format_entries(entries: &[String], start: usize) -> String {
    entries[start..]
        .iter()
        .enumerate()
        .map(|(offset, entry)| format!("{:>5}  {entry}\n", start + offset + 1))
        .collect()
}

async fn pipe_through(listing: String, pipeline: &str, ctx: &ShellContext) -> Result<()> {
    let mut command = Command::new(&ctx.config.shell);
    command
        .arg("-c")
        .arg(pipeline)
        .stdin(Stdio::piped())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    ctx.env.apply(&mut command);
    let mut child = command
        .spawn()
        .with_context(|| format!("history: failed to run '{pipeline}'"))?;
    if let Some(mut stdin) = child.stdin.take() {
        // The filter may exit before reading everything (`| head`).
        let _ = stdin.write_all(listing.as_bytes()).await;
    }
    child.wait().await.context("history: pipeline failed")?;
    Ok(())
}

#[async_trait]
impl BuiltinCommand for ListHistory {
    fn name(&self) -> &'static str {
        "history"
    }

    fn matches(&self, unit: &str, _ctx: &ShellContext) -> bool {
        verb_args(unit, "history").is_some() || verb_args(unit, "h").is_some()
    }

    async fn execute(&self, unit: &str, ctx: &ShellContext) -> Result<BuiltinOutcome> {
        let args = verb_args(unit, "history")
            .or_else(|| verb_args(unit, "h"))
            .unwrap_or_default();

        if let Some(pipeline) = args.strip_prefix('|') {
            let listing = {
                let history = ctx.history.lock();
                format_entries(history.entries(), 0)
            };
            pipe_through(listing, pipeline.trim(), ctx).await?;
            return Ok(BuiltinOutcome::Handled);
        }

        let history = ctx.history.lock();
        let entries = history.entries();
        let count = if args.is_empty() {
            entries.len()
        } else {
            args.parse::<usize>()
                .with_context(|| format!("history: {args}: numeric argument required"))?
        };
        print!("{}", format_entries(entries, entries.len().saturating_sub(count)));
        Ok(BuiltinOutcome::Handled)
    }
}

/// `outputs` lists captured stdout, newest first, addressable as `@n`.
pub(super) struct ListOutputs;

#[async_trait]
impl BuiltinCommand for ListOutputs {
    fn name(&self) -> &'static str {
        "outputs"
    }

    fn matches(&self, unit: &str, _ctx: &ShellContext) -> bool {
        unit.trim() == "outputs"
    }

    async fn execute(&self, _unit: &str, ctx: &ShellContext) -> Result<BuiltinOutcome> {
        let outputs = ctx.outputs.lock();
        if outputs.is_empty() {
            println!("No captured outputs yet.");
            return Ok(BuiltinOutcome::Handled);
        }
        for (index, entry) in outputs.iter().enumerate() {
            println!("{} {}", style(format!("@{index}")).cyan().bold(), entry.command);
            let lines: Vec<&str> = entry.output.lines().collect();
            for line in lines.iter().take(OUTPUT_LISTING_LINES) {
                println!("    {line}");
            }
            if lines.len() > OUTPUT_LISTING_LINES {
                let more = lines.len() - OUTPUT_LISTING_LINES;
                println!("{}", style(format!("    ... {more} more lines")).dimmed());
            }
        }
        Ok(BuiltinOutcome::Handled)
    }
}
