use aish_bash_runner::process_group::terminate_process_group_default;
use aish_bash_runner::{BackgroundJob, ForegroundReport};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tracing::debug;

use super::{BuiltinCommand, BuiltinOutcome, is_verb, verb_args};
use crate::context::ShellContext;
use crate::ui::{style, warning_text};

fn describe(job: &BackgroundJob) -> String {
    let state = if job.running { "Running" } else { "Done" };
    format!("[{}] {state:<8} {} (PID: {})", job.id, job.command, job.pid)
}

fn print_jobs(ctx: &ShellContext) {
    let jobs = ctx.jobs.list();
    if jobs.is_empty() {
        println!("No background jobs");
        return;
    }
    for job in jobs {
        println!("{}", describe(&job));
    }
}

/// `%2`, `2` or nothing.
fn parse_job_id(verb: &str, args: &str) -> Result<Option<u32>> {
    if args.is_empty() {
        return Ok(None);
    }
    let digits = args.strip_prefix('%').unwrap_or(args);
    digits
        .parse::<u32>()
        .map(Some)
        .with_context(|| format!("{verb}: {args}: no such job"))
}

fn follows_file(command: &str) -> bool {
    let mut words = command.split_whitespace();
    words.next().is_some_and(|program| program.rsplit('/').next() == Some("tail"))
        && words.any(|word| word == "-f" || word == "-F" || word == "--follow")
}

pub(super) struct ListJobs;

#[async_trait]
impl BuiltinCommand for ListJobs {
    fn name(&self) -> &'static str {
        "jobs"
    }

    fn matches(&self, unit: &str, _ctx: &ShellContext) -> bool {
        unit.trim() == "jobs"
    }

    async fn execute(&self, _unit: &str, ctx: &ShellContext) -> Result<BuiltinOutcome> {
        print_jobs(ctx);
        Ok(BuiltinOutcome::Handled)
    }
}

/// `fg [%n]`. Jobs run detached from the terminal, so this reports on the
/// job; a `tail -f` job can be stopped and re-run in the foreground instead.
pub(super) struct Foreground;

#[async_trait]
impl BuiltinCommand for Foreground {
    fn name(&self) -> &'static str {
        "fg"
    }

    fn matches(&self, unit: &str, _ctx: &ShellContext) -> bool {
        is_verb(unit, "fg")
    }

    async fn execute(&self, unit: &str, ctx: &ShellContext) -> Result<BuiltinOutcome> {
        let args = verb_args(unit, "fg").unwrap_or_default();
        let id = parse_job_id("fg", args)?;

        let job = match ctx.jobs.foreground(id) {
            ForegroundReport::NoJobs => bail!("fg: no background jobs"),
            ForegroundReport::NoRunningJobs => bail!("fg: no running background jobs"),
            ForegroundReport::NoSuchJob(id) => bail!("fg: %{id}: no such job"),
            ForegroundReport::Completed(job) => {
                println!("{}", style(format!("[{}] Done: {}", job.id, job.command)).green());
                return Ok(BuiltinOutcome::Handled);
            }
            ForegroundReport::Vanished(job) => {
                println!(
                    "{}",
                    warning_text(&format!(
                        "[{}] Process {} no longer exists: {}",
                        job.id, job.pid, job.command
                    ))
                );
                return Ok(BuiltinOutcome::Handled);
            }
            ForegroundReport::Running(job) => job,
        };

        if !follows_file(&job.command) {
            println!("{}", describe(&job));
            println!(
                "{}",
                style("Background jobs stay detached; their output is shown as it arrives.")
                    .dimmed()
            );
            return Ok(BuiltinOutcome::Handled);
        }

        let prompt = format!(
            "Job [{}] is following a file. Stop it and run it in the foreground?",
            job.id
        );
        if !ctx.prompter.confirm(&prompt) {
            return Ok(BuiltinOutcome::Handled);
        }

        let pid = job.pid;
        let outcome = tokio::task::spawn_blocking(move || terminate_process_group_default(pid))
            .await
            .context("fg: failed to stop the background job")?;
        debug!(id = job.id, pid, ?outcome, "stopped job for foreground run");
        ctx.jobs.mark_finished(job.id);

        println!("{}", style(format!("Executing: {}", job.command)).blue());
        Ok(BuiltinOutcome::HandledWithFollowup(job.command))
    }
}

/// `bg [%n]`. Jobs already run in the background; this only lists them.
pub(super) struct Background;

#[async_trait]
impl BuiltinCommand for Background {
    fn name(&self) -> &'static str {
        "bg"
    }

    fn matches(&self, unit: &str, _ctx: &ShellContext) -> bool {
        is_verb(unit, "bg")
    }

    async fn execute(&self, unit: &str, ctx: &ShellContext) -> Result<BuiltinOutcome> {
        let args = verb_args(unit, "bg").unwrap_or_default();
        parse_job_id("bg", args)?;
        println!(
            "{}",
            warning_text("bg: stopped jobs are not supported; start commands with '&' instead.")
        );
        print_jobs(ctx);
        Ok(BuiltinOutcome::Handled)
    }
}
