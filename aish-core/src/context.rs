//! State shared by the dispatcher and the built-in verbs for one session.

use std::path::PathBuf;
use std::sync::Arc;

use aish_bash_runner::{
    BackgroundJobRegistry, CommandRunner, InteractivityClassifier, ProcessRunner, RunnerOptions,
    SessionEnv,
};
use aish_config::ShellConfig;
use anyhow::Result;
use parking_lot::Mutex;

use crate::ai::{self, AiAssistant, DisabledAssistant};
use crate::aliases::AliasStore;
use crate::history::{CommandHistory, OutputHistory};
use crate::ui::{DialoguerPrompter, Prompter};

/// Directory bookkeeping for `cd -`, `pushd` and `popd`.
#[derive(Debug, Default)]
pub struct DirState {
    pub stack: Vec<PathBuf>,
    pub previous: Option<PathBuf>,
}

pub struct ShellContext {
    pub config: ShellConfig,
    pub runner: Arc<dyn CommandRunner>,
    pub jobs: BackgroundJobRegistry,
    pub env: SessionEnv,
    pub assistant: Arc<dyn AiAssistant>,
    pub prompter: Arc<dyn Prompter>,
    pub aliases: Mutex<AliasStore>,
    pub dirs: Mutex<DirState>,
    pub history: Mutex<CommandHistory>,
    pub outputs: Mutex<OutputHistory>,
}

impl ShellContext {
    /// Session backed by the configured history and alias files, running
    /// commands through a real [`ProcessRunner`].
    pub fn from_config(config: ShellConfig) -> Result<Self> {
        let history = CommandHistory::load(&config.history.file, config.history.limit)?;
        let aliases = AliasStore::load(&config.aliases_file)?;
        let assistant = ai::from_config(&config.ai)?;
        let mut ctx = Self::in_memory(config);
        ctx.history = Mutex::new(history);
        ctx.aliases = Mutex::new(aliases);
        ctx.assistant = assistant;
        Ok(ctx)
    }

    /// Session that persists nothing and has the assistant disabled.
    pub fn in_memory(config: ShellConfig) -> Self {
        let jobs = BackgroundJobRegistry::new(config.job_monitor_interval);
        Self::with_job_registry(config, jobs)
    }

    /// Like [`ShellContext::in_memory`], with background jobs tracked by `jobs`.
    pub fn with_job_registry(config: ShellConfig, jobs: BackgroundJobRegistry) -> Self {
        let env = SessionEnv::new();
        let classifier = config
            .interactive_list
            .as_deref()
            .map(InteractivityClassifier::from_csv)
            .unwrap_or_default();
        let runner = ProcessRunner::new(
            RunnerOptions {
                shell: config.shell.clone(),
                classifier,
                force_color: config.force_color_output,
            },
            env.clone(),
            jobs.clone(),
        );
        let history_limit = config.history.limit;

        Self {
            config,
            runner: Arc::new(runner),
            jobs,
            env,
            assistant: Arc::new(DisabledAssistant),
            prompter: Arc::new(DialoguerPrompter),
            aliases: Mutex::new(AliasStore::in_memory()),
            dirs: Mutex::new(DirState::default()),
            history: Mutex::new(CommandHistory::in_memory(history_limit)),
            outputs: Mutex::new(OutputHistory::new()),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_assistant(mut self, assistant: Arc<dyn AiAssistant>) -> Self {
        self.assistant = assistant;
        self
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }
}
