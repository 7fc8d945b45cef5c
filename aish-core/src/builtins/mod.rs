//! Verbs handled inside the shell process.
//!
//! The table is fixed at startup and searched in order; the first handler
//! whose [`BuiltinCommand::matches`] accepts a unit owns it.

mod ai;
mod alias;
mod environment;
mod history;
mod jobs;
mod navigation;

use anyhow::Result;
use async_trait::async_trait;

use crate::context::ShellContext;

/// What a built-in did with a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuiltinOutcome {
    Handled,
    /// Handled, and this line should be dispatched next.
    HandledWithFollowup(String),
    /// Let the runner execute the unit after all.
    NotHandled,
}

#[async_trait]
pub trait BuiltinCommand: Send + Sync {
    fn name(&self) -> &'static str;

    fn matches(&self, unit: &str, ctx: &ShellContext) -> bool;

    async fn execute(&self, unit: &str, ctx: &ShellContext) -> Result<BuiltinOutcome>;
}

pub struct BuiltinRegistry {
    handlers: Vec<Box<dyn BuiltinCommand>>,
}

impl BuiltinRegistry {
    /// The shell's verbs in lookup order.
    pub fn standard() -> Self {
        let handlers: Vec<Box<dyn BuiltinCommand>> = vec![
            Box::new(ai::GenerateCommand),
            Box::new(ai::AskQuestion),
            Box::new(ai::ExplainCommand),
            Box::new(history::RecallHistory),
            Box::new(navigation::ChangeDirectory),
            Box::new(navigation::PushDirectory),
            Box::new(navigation::PopDirectory),
            Box::new(navigation::ListDirectories),
            Box::new(environment::Export),
            Box::new(alias::DefineAlias),
            Box::new(alias::RemoveAlias),
            Box::new(alias::ExpandAlias),
            Box::new(history::ListHistory),
            Box::new(history::ListOutputs),
            Box::new(jobs::ListJobs),
            Box::new(jobs::Foreground),
            Box::new(jobs::Background),
            Box::new(Version),
        ];
        Self { handlers }
    }

    pub fn find_handler(&self, unit: &str, ctx: &ShellContext) -> Option<&dyn BuiltinCommand> {
        self.handlers
            .iter()
            .find(|handler| handler.matches(unit, ctx))
            .map(Box::as_ref)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.iter().map(|handler| handler.name())
    }
}

/// `unit` is `verb` alone or `verb` followed by whitespace.
pub(crate) fn is_verb(unit: &str, verb: &str) -> bool {
    verb_args(unit, verb).is_some()
}

/// Trimmed arguments after `verb`, if `unit` invokes it.
pub(crate) fn verb_args<'a>(unit: &'a str, verb: &str) -> Option<&'a str> {
    let rest = unit.trim().strip_prefix(verb)?;
    if rest.is_empty() {
        Some(rest)
    } else if rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

struct Version;

#[async_trait]
impl BuiltinCommand for Version {
    fn name(&self) -> &'static str {
        "version"
    }

    fn matches(&self, unit: &str, _ctx: &ShellContext) -> bool {
        unit.trim() == "version"
    }

    async fn execute(&self, _unit: &str, _ctx: &ShellContext) -> Result<BuiltinOutcome> {
        println!("{} {}", crate::SHELL_NAME, crate::VERSION);
        Ok(BuiltinOutcome::Handled)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use aish_config::ShellConfig;

    use crate::context::ShellContext;

    /// In-memory context rooted at a throwaway home directory.
    pub fn context(home: &std::path::Path) -> ShellContext {
        let config = ShellConfig::from_lookup(|_| None, Some(home))
            .unwrap_or_else(|err| panic!("config: {err}"));
        ShellContext::in_memory(config)
    }
}
