use std::path::PathBuf;

use clap::Parser;

/// Interactive shell with AI-generated commands and background job tracking.
#[derive(Debug, Parser)]
#[command(name = "aish", version, about, long_about = None)]
pub struct Cli {
    /// Run one command line and exit
    #[arg(short = 'c', long = "command", value_name = "LINE", conflicts_with_all = ["question", "generate"])]
    pub command: Option<String>,

    /// Ask the assistant a question and exit
    #[arg(short = 'q', long = "question", value_name = "TEXT", conflicts_with = "generate")]
    pub question: Option<String>,

    /// Generate a command from a description, run it and exit
    #[arg(short = 'g', long = "generate", value_name = "TEXT")]
    pub generate: Option<String>,

    /// Read settings from this rc file instead of ~/.aish
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    /// The single line to dispatch in one-shot mode, if any.
    pub fn one_shot_line(&self) -> Option<String> {
        if let Some(line) = &self.command {
            return Some(line.clone());
        }
        if let Some(question) = &self.question {
            return Some(format!("?{question}"));
        }
        self.generate.as_ref().map(|request| format!("#{request}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn one_shot_modes_map_to_dispatcher_lines() {
        let cli = Cli::parse_from(["aish", "-c", "ls -la"]);
        assert_eq!(cli.one_shot_line().as_deref(), Some("ls -la"));
        let cli = Cli::parse_from(["aish", "-q", "what is a pid"]);
        assert_eq!(cli.one_shot_line().as_deref(), Some("?what is a pid"));
        let cli = Cli::parse_from(["aish", "--generate", "list files"]);
        assert_eq!(cli.one_shot_line().as_deref(), Some("#list files"));
        let cli = Cli::parse_from(["aish", "--no-color"]);
        assert!(cli.no_color);
        assert_eq!(cli.one_shot_line(), None);
    }

    #[test]
    fn one_shot_flags_conflict() {
        assert!(Cli::try_parse_from(["aish", "-c", "ls", "-q", "why"]).is_err());
    }
}
