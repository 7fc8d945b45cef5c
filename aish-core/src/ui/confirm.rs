//! Yes/no prompts.
//!
//! Every question the shell asks goes through a [`Prompter`], so the
//! dispatcher and the built-ins can be driven by a script in tests.

use std::collections::VecDeque;
use std::io::IsTerminal;

use dialoguer::Confirm;
use parking_lot::Mutex;
use tracing::debug;

pub trait Prompter: Send + Sync {
    /// Ask `message`; anything but an explicit yes is a no.
    fn confirm(&self, message: &str) -> bool;
}

/// Terminal prompter backed by `dialoguer`.
///
/// Answers no without asking when stdin is not a terminal, so piped input and
/// `-c` runs never block on a question.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn confirm(&self, message: &str) -> bool {
        if !std::io::stdin().is_terminal() {
            debug!(%message, "stdin is not a terminal, answering no");
            return false;
        }
        Confirm::new()
            .with_prompt(message)
            .default(false)
            .interact()
            .unwrap_or_else(|err| {
                debug!(error = %err, "prompt failed, answering no");
                false
            })
    }
}

/// Prompter that replays fixed answers and records the questions asked.
/// Once the script runs out every answer is no.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<bool>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, message: &str) -> bool {
        self.asked.lock().push(message.to_owned());
        self.answers.lock().pop_front().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_answers_then_no() {
        let prompter = ScriptedPrompter::new([true, false]);
        assert!(prompter.confirm("first?"));
        assert!(!prompter.confirm("second?"));
        assert!(!prompter.confirm("third?"));
        assert_eq!(prompter.asked(), vec!["first?", "second?", "third?"]);
    }
}
