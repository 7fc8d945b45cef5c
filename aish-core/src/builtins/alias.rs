use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::debug;

use super::{BuiltinCommand, BuiltinOutcome, is_verb, verb_args};
use crate::context::ShellContext;

fn first_word(unit: &str) -> &str {
    unit.split_whitespace().next().unwrap_or_default()
}

fn strip_quotes(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|quote| {
            value
                .strip_prefix(*quote)
                .and_then(|rest| rest.strip_suffix(*quote))
        })
        .unwrap_or(value)
}

/// `alias`, `alias name`, `alias name='value'`.
pub(super) struct DefineAlias;

#[async_trait]
impl BuiltinCommand for DefineAlias {
    fn name(&self) -> &'static str {
        "alias"
    }

    fn matches(&self, unit: &str, _ctx: &ShellContext) -> bool {
        is_verb(unit, "alias")
    }

    async fn execute(&self, unit: &str, ctx: &ShellContext) -> Result<BuiltinOutcome> {
        let args = verb_args(unit, "alias").unwrap_or_default();
        if args.is_empty() {
            for (name, value) in ctx.aliases.lock().iter() {
                println!("alias {name}='{value}'");
            }
            return Ok(BuiltinOutcome::Handled);
        }

        let Some((name, value)) = args.split_once('=') else {
            match ctx.aliases.lock().get(args) {
                Some(value) => println!("alias {args}='{value}'"),
                None => bail!("alias: {args}: not found"),
            }
            return Ok(BuiltinOutcome::Handled);
        };
        let name = name.trim();
        let value = strip_quotes(value.trim());
        if name.is_empty() || name.contains(char::is_whitespace) || value.is_empty() {
            bail!("alias: invalid format '{args}', expected name='value'");
        }
        ctx.aliases.lock().set(name, value)?;
        debug!(%name, %value, "alias defined");
        Ok(BuiltinOutcome::Handled)
    }
}

pub(super) struct RemoveAlias;

#[async_trait]
impl BuiltinCommand for RemoveAlias {
    fn name(&self) -> &'static str {
        "unalias"
    }

    fn matches(&self, unit: &str, _ctx: &ShellContext) -> bool {
        is_verb(unit, "unalias")
    }

    async fn execute(&self, unit: &str, ctx: &ShellContext) -> Result<BuiltinOutcome> {
        let name = verb_args(unit, "unalias").unwrap_or_default();
        if name.is_empty() {
            bail!("unalias: usage: unalias name");
        }
        if !ctx.aliases.lock().remove(name)? {
            bail!("unalias: {name}: not found");
        }
        Ok(BuiltinOutcome::Handled)
    }
}

/// Rewrites a unit whose first word is an alias. A unit that already starts
/// with the alias value is left alone, so `alias ls='ls -G'` expands once.
pub(super) struct ExpandAlias;

impl ExpandAlias {
    fn expansion(unit: &str, ctx: &ShellContext) -> Option<String> {
        let unit = unit.trim();
        let word = first_word(unit);
        let aliases = ctx.aliases.lock();
        let value = aliases.get(word)?;
        if unit.starts_with(value) {
            return None;
        }
        Some(format!("{value}{}", &unit[word.len()..]))
    }
}

#[async_trait]
impl BuiltinCommand for ExpandAlias {
    fn name(&self) -> &'static str {
        "alias expansion"
    }

    fn matches(&self, unit: &str, ctx: &ShellContext) -> bool {
        Self::expansion(unit, ctx).is_some()
    }

    async fn execute(&self, unit: &str, ctx: &ShellContext) -> Result<BuiltinOutcome> {
        Ok(match Self::expansion(unit, ctx) {
            Some(expanded) => {
                debug!(%unit, %expanded, "expanded alias");
                BuiltinOutcome::HandledWithFollowup(expanded)
            }
            None => BuiltinOutcome::NotHandled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::test_support;

    #[tokio::test]
    async fn define_expand_and_remove() {
        let home = assert_fs::TempDir::new().unwrap();
        let ctx = test_support::context(home.path());

        DefineAlias.execute("alias ll='ls -la'", &ctx).await.unwrap();
        assert!(ExpandAlias.matches("ll /tmp", &ctx));
        assert_eq!(
            ExpandAlias.execute("ll /tmp", &ctx).await.unwrap(),
            BuiltinOutcome::HandledWithFollowup("ls -la /tmp".into())
        );
        assert!(!ExpandAlias.matches("lll", &ctx));

        RemoveAlias.execute("unalias ll", &ctx).await.unwrap();
        assert!(!ExpandAlias.matches("ll", &ctx));
        assert!(RemoveAlias.execute("unalias ll", &ctx).await.is_err());
    }

    #[tokio::test]
    async fn self_referencing_alias_expands_once() {
        let home = assert_fs::TempDir::new().unwrap();
        let ctx = test_support::context(home.path());
        DefineAlias.execute("alias ls=\"ls --color=auto\"", &ctx).await.unwrap();

        assert!(ExpandAlias.matches("ls -l", &ctx));
        assert!(!ExpandAlias.matches("ls --color=auto -l", &ctx));
    }

    #[tokio::test]
    async fn malformed_definitions_are_rejected() {
        let home = assert_fs::TempDir::new().unwrap();
        let ctx = test_support::context(home.path());
        assert!(DefineAlias.execute("alias bad name=x", &ctx).await.is_err());
        assert!(DefineAlias.execute("alias empty=''", &ctx).await.is_err());
        assert!(DefineAlias.execute("alias missing", &ctx).await.is_err());
    }
}
