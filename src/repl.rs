//! The interactive read-dispatch loop.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;

use aish_bash_runner::SigintGuard;
use aish_bash_runner::interrupt::clear_interrupt;
use aish_core::ui::style;
use aish_core::{CommandDispatcher, SHELL_NAME, VERSION};
use anyhow::{Context, Result};
use tracing::{debug, warn};

const EXIT_WORDS: &[&str] = &["exit", "quit", "q"];

const HELP: &str = "\
Commands run through the configured shell. Besides that aish understands:

  #<request>        generate a command with the assistant and run it
  ##<request>       show the generated command as a comment only
  ?<question>       ask the assistant; $_ and @n refer to captured outputs
  explain <cmd>     describe a command and its flags without running it
  cmd &             run in the background (see jobs, fg, bg)
  cd, pushd, popd, dirs
  export NAME=VALUE
  alias name='value', unalias name
  history [n], h, !!, !n, !prefix
  outputs           list captured command output
  version, help, exit

Lines are split on ';' (keep going) and '&&' (stop on failure).";

fn display_dir(cwd: &Path, home: Option<&Path>) -> String {
    match home.and_then(|home| cwd.strip_prefix(home).ok()) {
        Some(rest) if rest.as_os_str().is_empty() => "~".to_owned(),
        Some(rest) => format!("~/{}", rest.display()),
        None => cwd.display().to_string(),
    }
}

fn prompt() -> String {
    let cwd = std::env::current_dir()
        .map(|cwd| display_dir(&cwd, dirs::home_dir().as_deref()))
        .unwrap_or_else(|_| "?".to_owned());
    format!(
        "{}:{}$ ",
        style(SHELL_NAME).green().bold(),
        style(cwd).blue().bold()
    )
}

fn read_line() -> io::Result<Option<String>> {
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line)? {
        0 => Ok(None),
        _ => Ok(Some(line)),
    }
}

/// Read lines until EOF or an exit word. The prompt and banner are only
/// shown when stdin is a terminal.
pub async fn run(dispatcher: &CommandDispatcher) -> Result<()> {
    let _guard = SigintGuard::install()
        .map_err(|err| warn!(error = %err, "could not install session SIGINT guard"))
        .ok();
    let interactive = io::stdin().is_terminal();

    if interactive {
        println!(
            "{} {VERSION}. Type 'help' for usage, 'exit' to leave.",
            style(SHELL_NAME).bold()
        );
    }

    loop {
        if interactive {
            print!("{}", prompt());
            io::stdout().flush().context("failed to write prompt")?;
        }

        let line = tokio::task::spawn_blocking(read_line)
            .await
            .context("prompt reader stopped")?
            .context("failed to read from stdin")?;
        let Some(line) = line else {
            if interactive {
                println!();
            }
            break;
        };
        if clear_interrupt() {
            debug!("Ctrl+C at the prompt");
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&line) {
            break;
        }
        if line == "help" {
            println!("{HELP}");
            continue;
        }

        let outcome = dispatcher.execute(line).await;
        debug!(?outcome, "line finished");
        dispatcher.context().history.lock().record(line);
    }
    Ok(())
}
