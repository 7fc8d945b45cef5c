//! Dispatch layer of the aish shell.
//!
//! [`dispatch::CommandDispatcher`] splits a line into units, routes each unit
//! to a built-in verb or to the process runner from `aish-bash-runner`, and
//! applies the warn/error policy to the result. The assistant in [`ai`] backs
//! the `#` and `?` verbs and the hints offered after failures.

pub mod ai;
pub mod aliases;
pub mod builtins;
pub mod chain;
pub mod context;
pub mod dispatch;
pub mod history;
pub mod ui;

pub use ai::{AiAssistant, DisabledAssistant, OpenAiAssistant};
pub use builtins::{BuiltinCommand, BuiltinOutcome, BuiltinRegistry};
pub use context::ShellContext;
pub use dispatch::{AbortReason, CommandDispatcher, DispatchOutcome, FailureKind};

pub const SHELL_NAME: &str = "aish";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
