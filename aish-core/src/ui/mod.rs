pub mod confirm;

pub use aish_bash_runner::style::{StyledString, error_text, style, warning_text};
pub use confirm::{DialoguerPrompter, Prompter, ScriptedPrompter};
