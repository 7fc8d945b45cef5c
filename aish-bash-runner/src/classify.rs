//! Decides whether a command unit needs the real terminal.

/// Programs that take over the terminal when no `INTERACTIVE_LIST` is set.
pub const DEFAULT_INTERACTIVE_LIST: &str = "vi,vim,nano,emacs,less,more,top,htop,tail -f,watch";

/// Config-driven predicate over command units.
///
/// Each entry is a program name, optionally followed by arguments
/// (`tail -f`). A pipeline stage matches an entry when its leading tokens
/// equal the entry's tokens; the program token may be path-qualified
/// (`/usr/bin/vim` matches `vim`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractivityClassifier {
    entries: Vec<Vec<String>>,
}

impl Default for InteractivityClassifier {
    fn default() -> Self {
        Self::from_csv(DEFAULT_INTERACTIVE_LIST)
    }
}

impl InteractivityClassifier {
    /// Build from a comma-separated list. Blank entries are ignored.
    pub fn from_csv(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .map(|entry| {
                entry
                    .as_ref()
                    .split_whitespace()
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            })
            .filter(|tokens| !tokens.is_empty())
            .collect();
        Self { entries }
    }

    /// True when any pipeline stage of `unit` starts with an interactive program.
    pub fn is_interactive(&self, unit: &str) -> bool {
        if unit.contains('|') {
            unit.split('|').any(|stage| self.stage_matches(stage))
        } else {
            self.stage_matches(unit)
        }
    }

    fn stage_matches(&self, stage: &str) -> bool {
        let tokens: Vec<&str> = stage.split_whitespace().collect();
        let Some(program) = tokens.first() else {
            return false;
        };

        self.entries.iter().any(|entry| {
            if entry.len() > tokens.len() || !program_matches(program, &entry[0]) {
                return false;
            }
            entry[1..]
                .iter()
                .zip(&tokens[1..])
                .all(|(expected, actual)| expected == actual)
        })
    }
}

fn program_matches(token: &str, name: &str) -> bool {
    token == name
        || token
            .strip_suffix(name)
            .is_some_and(|prefix| prefix.ends_with('/'))
}
