use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{BuiltinCommand, BuiltinOutcome, is_verb, verb_args};
use crate::context::ShellContext;

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| anyhow!("cd: HOME not set"))
}

fn strip_quotes(arg: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = arg
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    arg
}

/// Let the shell expand `$VAR` and backticks in a directory argument.
async fn shell_expand(arg: &str, ctx: &ShellContext) -> Result<String> {
    let mut command = Command::new(&ctx.config.shell);
    command.arg("-c").arg(format!("printf '%s' {arg}"));
    ctx.env.apply(&mut command);
    let output = command
        .output()
        .await
        .with_context(|| format!("failed to expand '{arg}'"))?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

async fn resolve_target(arg: &str, ctx: &ShellContext) -> Result<PathBuf> {
    let arg = arg.trim();
    if arg.contains('$') || arg.contains('`') {
        let expanded = shell_expand(arg, ctx).await?;
        debug!(%arg, %expanded, "expanded directory argument");
        return Ok(PathBuf::from(expanded));
    }
    let arg = strip_quotes(arg);
    match arg {
        "" | "~" => home_dir(),
        _ => match arg.strip_prefix("~/") {
            Some(rest) => Ok(home_dir()?.join(rest)),
            None => Ok(PathBuf::from(arg)),
        },
    }
}

/// Change the process working directory, remembering the old one for `cd -`.
fn change_dir(ctx: &ShellContext, target: &Path, shown_as: &str) -> Result<PathBuf> {
    if !target.exists() {
        bail!("cd: {shown_as}: No such file or directory");
    }
    if !target.is_dir() {
        bail!("cd: {shown_as}: Not a directory");
    }
    let previous = std::env::current_dir().ok();
    std::env::set_current_dir(target).with_context(|| format!("cd: {shown_as}"))?;
    let now = std::env::current_dir().unwrap_or_else(|_| target.to_path_buf());
    if let Some(previous) = previous {
        ctx.dirs.lock().previous = Some(previous);
    }
    debug!(dir = %now.display(), "changed directory");
    Ok(now)
}

pub(super) struct ChangeDirectory;

#[async_trait]
impl BuiltinCommand for ChangeDirectory {
    fn name(&self) -> &'static str {
        "cd"
    }

    fn matches(&self, unit: &str, _ctx: &ShellContext) -> bool {
        is_verb(unit, "cd")
    }

    async fn execute(&self, unit: &str, ctx: &ShellContext) -> Result<BuiltinOutcome> {
        let arg = verb_args(unit, "cd").unwrap_or_default();
        if arg == "-" {
            let previous = ctx
                .dirs
                .lock()
                .previous
                .clone()
                .ok_or_else(|| anyhow!("cd: OLDPWD not set"))?;
            let now = change_dir(ctx, &previous, "-")?;
            println!("{}", now.display());
            return Ok(BuiltinOutcome::Handled);
        }
        let target = resolve_target(arg, ctx).await?;
        change_dir(ctx, &target, arg)?;
        Ok(BuiltinOutcome::Handled)
    }
}

fn print_stack(ctx: &ShellContext) {
    let mut entries = vec![
        std::env::current_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default(),
    ];
    entries.extend(
        ctx.dirs
            .lock()
            .stack
            .iter()
            .rev()
            .map(|dir| dir.display().to_string()),
    );
    println!("{}", entries.join(" "));
}

pub(super) struct PushDirectory;

#[async_trait]
impl BuiltinCommand for PushDirectory {
    fn name(&self) -> &'static str {
        "pushd"
    }

    fn matches(&self, unit: &str, _ctx: &ShellContext) -> bool {
        is_verb(unit, "pushd")
    }

    async fn execute(&self, unit: &str, ctx: &ShellContext) -> Result<BuiltinOutcome> {
        let arg = verb_args(unit, "pushd").unwrap_or_default();
        if arg.is_empty() {
            bail!("pushd: no other directory");
        }
        let current = std::env::current_dir().context("pushd: current directory is unavailable")?;
        let target = resolve_target(arg, ctx).await?;
        change_dir(ctx, &target, arg)?;
        ctx.dirs.lock().stack.push(current);
        print_stack(ctx);
        Ok(BuiltinOutcome::Handled)
    }
}

pub(super) struct PopDirectory;

#[async_trait]
impl BuiltinCommand for PopDirectory {
    fn name(&self) -> &'static str {
        "popd"
    }

    fn matches(&self, unit: &str, _ctx: &ShellContext) -> bool {
        unit.trim() == "popd"
    }

    async fn execute(&self, _unit: &str, ctx: &ShellContext) -> Result<BuiltinOutcome> {
        let target = ctx
            .dirs
            .lock()
            .stack
            .pop()
            .ok_or_else(|| anyhow!("popd: directory stack empty"))?;
        let shown = target.display().to_string();
        if let Err(err) = change_dir(ctx, &target, &shown) {
            ctx.dirs.lock().stack.push(target);
            return Err(err);
        }
        print_stack(ctx);
        Ok(BuiltinOutcome::Handled)
    }
}

pub(super) struct ListDirectories;

#[async_trait]
impl BuiltinCommand for ListDirectories {
    fn name(&self) -> &'static str {
        "dirs"
    }

    fn matches(&self, unit: &str, _ctx: &ShellContext) -> bool {
        unit.trim() == "dirs"
    }

    async fn execute(&self, _unit: &str, ctx: &ShellContext) -> Result<BuiltinOutcome> {
        print_stack(ctx);
        Ok(BuiltinOutcome::Handled)
    }
}

#[cfg(test)]
mod tests {
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use serial_test::serial;

    use super::*;
    use crate::builtins::test_support;

    struct RestoreCwd(PathBuf);

    impl Drop for RestoreCwd {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }

    fn cwd() -> PathBuf {
        std::env::current_dir().unwrap().canonicalize().unwrap()
    }

    #[tokio::test]
    #[serial]
    async fn cd_and_cd_dash() {
        let _restore = RestoreCwd(std::env::current_dir().unwrap());
        let dir = TempDir::new().unwrap();
        dir.child("sub").create_dir_all().unwrap();
        let start = cwd();
        let ctx = test_support::context(dir.path());

        let unit = format!("cd {}", dir.child("sub").path().display());
        ChangeDirectory.execute(&unit, &ctx).await.unwrap();
        assert_eq!(cwd(), dir.child("sub").path().canonicalize().unwrap());

        ChangeDirectory.execute("cd -", &ctx).await.unwrap();
        assert_eq!(cwd(), start);
    }

    #[tokio::test]
    #[serial]
    async fn cd_reports_missing_and_file_targets() {
        let _restore = RestoreCwd(std::env::current_dir().unwrap());
        let dir = TempDir::new().unwrap();
        dir.child("file.txt").touch().unwrap();
        let ctx = test_support::context(dir.path());
        let before = cwd();

        let missing = format!("cd {}", dir.child("nope").path().display());
        let err = ChangeDirectory.execute(&missing, &ctx).await.unwrap_err();
        assert!(err.to_string().contains("No such file or directory"));

        let file = format!("cd {}", dir.child("file.txt").path().display());
        let err = ChangeDirectory.execute(&file, &ctx).await.unwrap_err();
        assert!(err.to_string().contains("Not a directory"));
        assert_eq!(cwd(), before);

        let err = ChangeDirectory.execute("cd -", &ctx).await.unwrap_err();
        assert!(err.to_string().contains("OLDPWD"));
    }

    #[tokio::test]
    #[serial]
    async fn cd_expands_session_variables() {
        let _restore = RestoreCwd(std::env::current_dir().unwrap());
        let dir = TempDir::new().unwrap();
        let ctx = test_support::context(dir.path());
        ctx.env.set("TARGET_DIR", dir.path().display().to_string());

        ChangeDirectory.execute("cd $TARGET_DIR", &ctx).await.unwrap();
        assert_eq!(cwd(), dir.path().canonicalize().unwrap());
    }

    #[tokio::test]
    #[serial]
    async fn pushd_and_popd_walk_the_stack() {
        let _restore = RestoreCwd(std::env::current_dir().unwrap());
        let dir = TempDir::new().unwrap();
        let start = cwd();
        let ctx = test_support::context(dir.path());

        let unit = format!("pushd '{}'", dir.path().display());
        PushDirectory.execute(&unit, &ctx).await.unwrap();
        assert_eq!(cwd(), dir.path().canonicalize().unwrap());
        assert_eq!(ctx.dirs.lock().stack.len(), 1);

        PopDirectory.execute("popd", &ctx).await.unwrap();
        assert_eq!(cwd(), start);
        assert!(PopDirectory.execute("popd", &ctx).await.is_err());
    }
}
