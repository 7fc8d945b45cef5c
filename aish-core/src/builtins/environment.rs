use anyhow::{Result, bail};
use async_trait::async_trait;

use super::{BuiltinCommand, BuiltinOutcome, is_verb, verb_args};
use crate::context::ShellContext;

fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Split `NAME=VALUE`, dropping one pair of quotes around the value.
pub(crate) fn parse_assignment(text: &str) -> Option<(&str, &str)> {
    let (name, value) = text.trim().split_once('=')?;
    let name = name.trim();
    if !valid_name(name) {
        return None;
    }
    let value = value.trim();
    let value = ['"', '\'']
        .iter()
        .find_map(|quote| {
            value
                .strip_prefix(*quote)
                .and_then(|rest| rest.strip_suffix(*quote))
        })
        .unwrap_or(value);
    Some((name, value))
}

/// `export NAME=VALUE` sets a variable for every later child process.
pub(super) struct Export;

#[async_trait]
impl BuiltinCommand for Export {
    fn name(&self) -> &'static str {
        "export"
    }

    fn matches(&self, unit: &str, _ctx: &ShellContext) -> bool {
        is_verb(unit, "export")
    }

    async fn execute(&self, unit: &str, ctx: &ShellContext) -> Result<BuiltinOutcome> {
        let args = verb_args(unit, "export").unwrap_or_default();
        if args.is_empty() {
            for (name, value) in ctx.env.snapshot() {
                println!("export {name}=\"{value}\"");
            }
            return Ok(BuiltinOutcome::Handled);
        }
        let Some((name, value)) = parse_assignment(args) else {
            bail!("export: invalid format '{args}', expected NAME=VALUE");
        };
        ctx.env.set(name, value);
        Ok(BuiltinOutcome::Handled)
    }
}
