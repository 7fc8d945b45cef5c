//! Terminal styling shared by the runner and the shell front-end.
//!
//! Styling uses anstyle and honors the process-wide `colorchoice` setting, so
//! `--no-color` (or a non-terminal stream under `Auto`) renders plain text.

use std::io::IsTerminal;

use anstyle::{AnsiColor, Color, Effects, Style};
use colorchoice::ColorChoice;

/// Which stream a styled string is headed for; decides the `Auto` check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Stdout,
    Stderr,
}

fn colors_enabled(target: Target) -> bool {
    match ColorChoice::global() {
        ColorChoice::Never => false,
        ColorChoice::Always | ColorChoice::AlwaysAnsi => true,
        ColorChoice::Auto => match target {
            Target::Stdout => std::io::stdout().is_terminal(),
            Target::Stderr => std::io::stderr().is_terminal(),
        },
    }
}

/// Start styling `text` for stdout.
pub fn style(text: impl std::fmt::Display) -> StyledString {
    StyledString {
        text: text.to_string(),
        style: Style::new(),
        target: Target::Stdout,
    }
}

pub struct StyledString {
    text: String,
    style: Style,
    target: Target,
}

impl StyledString {
    fn fg(mut self, color: AnsiColor) -> Self {
        self.style = self.style.fg_color(Some(Color::Ansi(color)));
        self
    }

    pub fn red(self) -> Self {
        self.fg(AnsiColor::Red)
    }

    pub fn green(self) -> Self {
        self.fg(AnsiColor::Green)
    }

    pub fn blue(self) -> Self {
        self.fg(AnsiColor::Blue)
    }

    pub fn yellow(self) -> Self {
        self.fg(AnsiColor::Yellow)
    }

    pub fn cyan(self) -> Self {
        self.fg(AnsiColor::Cyan)
    }

    pub fn magenta(self) -> Self {
        self.fg(AnsiColor::Magenta)
    }

    pub fn bold(mut self) -> Self {
        self.style = self.style.effects(self.style.get_effects() | Effects::BOLD);
        self
    }

    pub fn dimmed(mut self) -> Self {
        self.style = self
            .style
            .effects(self.style.get_effects() | Effects::DIMMED);
        self
    }

    /// Render for stderr instead of stdout.
    pub fn for_stderr(mut self) -> Self {
        self.target = Target::Stderr;
        self
    }
}

impl std::fmt::Display for StyledString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if colors_enabled(self.target) {
            write!(
                f,
                "{}{}{}",
                self.style.render(),
                self.text,
                self.style.render_reset()
            )
        } else {
            f.write_str(&self.text)
        }
    }
}

/// Red text bound for stderr, used for error output.
pub fn error_text(text: &str) -> StyledString {
    style(text).red().for_stderr()
}

/// Yellow text bound for stderr, used for warnings.
pub fn warning_text(text: &str) -> StyledString {
    style(text).yellow().for_stderr()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_renders_plain_text() {
        ColorChoice::Never.write_global();
        assert_eq!(style("hello").red().bold().to_string(), "hello");
        assert_eq!(error_text("boom").to_string(), "boom");
    }

    #[test]
    fn styles_compose() {
        let styled = style("x").green().bold();
        assert_eq!(
            styled.style.get_fg_color(),
            Some(Color::Ansi(AnsiColor::Green))
        );
        assert!(styled.style.get_effects().contains(Effects::BOLD));
        assert_eq!(styled.target, Target::Stdout);
        assert_eq!(styled.for_stderr().target, Target::Stderr);
    }
}
