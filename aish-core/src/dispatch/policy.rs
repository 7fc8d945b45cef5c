//! Classification of a finished command into what the dispatcher does next.

use aish_bash_runner::{ABORTED_EXIT_CODE, ExecutionResult, INTERRUPT_MARKER, INTERRUPTED_EXIT_CODE};

/// Programs that write routine progress and banners to stderr.
pub const SSH_COMMANDS: &[&str] = &[
    "ssh",
    "scp",
    "sftp",
    "rsync",
    "ssh-keygen",
    "ssh-copy-id",
    "ssh-add",
];

pub const NO_ERROR_OUTPUT_MESSAGE: &str =
    "Command failed with non-zero exit code but no error output";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success,
    /// An SSH-family command succeeded and wrote to stderr; show it as output.
    SshNotice,
    Interrupted,
    LaunchFailed,
    CommandNotFound { name: String },
    PathNotFound,
    Failed {
        message: String,
        offer_explanation: bool,
    },
}

fn program_name(unit: &str) -> &str {
    let first = unit.split_whitespace().next().unwrap_or_default();
    first.rsplit('/').next().unwrap_or(first)
}

pub fn is_ssh_family(unit: &str) -> bool {
    SSH_COMMANDS.contains(&program_name(unit))
}

/// Name of the missing program, from `bash: line 1: foo: command not found`.
pub fn missing_command_name(unit: &str, stderr: &str) -> String {
    stderr
        .lines()
        .find_map(|line| line.split_once(": command not found"))
        .and_then(|(head, _)| head.rsplit(": ").next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| program_name(unit))
        .to_owned()
}

pub fn classify(unit: &str, result: &ExecutionResult, ignore_errors: bool) -> Verdict {
    let stderr = result.stderr.trim();

    if result.exit_code == ABORTED_EXIT_CODE {
        return if result.was_interrupted() {
            Verdict::Interrupted
        } else {
            Verdict::LaunchFailed
        };
    }
    if result.exit_code == INTERRUPTED_EXIT_CODE && stderr.contains(INTERRUPT_MARKER) {
        return Verdict::Interrupted;
    }

    if !stderr.is_empty() {
        if is_ssh_family(unit) {
            return if result.exit_code == 0 {
                Verdict::SshNotice
            } else {
                Verdict::Failed {
                    message: stderr.to_owned(),
                    offer_explanation: false,
                }
            };
        }
        if stderr.contains("command not found") {
            return Verdict::CommandNotFound {
                name: missing_command_name(unit, stderr),
            };
        }
        if stderr.contains("No such file or directory") {
            return Verdict::PathNotFound;
        }
        // Leftover stderr fails the unit even on exit 0; the explanation
        // offer needs a non-zero exit.
        return Verdict::Failed {
            message: stderr.to_owned(),
            offer_explanation: result.exit_code != 0 && !ignore_errors,
        };
    }

    if result.exit_code != 0 {
        return Verdict::Failed {
            message: NO_ERROR_OUTPUT_MESSAGE.to_owned(),
            offer_explanation: !ignore_errors,
        };
    }
    Verdict::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exit_code: i32, stderr: &str) -> ExecutionResult {
        ExecutionResult {
            exit_code,
            stderr: stderr.to_owned(),
            streamed: true,
            ..ExecutionResult::default()
        }
    }

    #[test]
    fn aborts_and_interrupts() {
        assert_eq!(
            classify("ls", &result(-1, "Failed to start command: nope"), false),
            Verdict::LaunchFailed
        );
        assert_eq!(
            classify("vim", &result(-1, "Interactive command interrupted by user (Ctrl+C)"), false),
            Verdict::Interrupted
        );
        assert_eq!(
            classify("sleep 9", &result(130, "\nCommand interrupted by user"), false),
            Verdict::Interrupted
        );
        assert!(matches!(
            classify("sleep 9", &result(130, ""), false),
            Verdict::Failed { .. }
        ));
    }

    #[test]
    fn ssh_family_stderr_is_informational() {
        assert_eq!(
            classify("ssh host uptime", &result(0, "Warning: Permanently added"), false),
            Verdict::SshNotice
        );
        assert_eq!(
            classify("/usr/bin/scp a b:", &result(1, "lost connection"), false),
            Verdict::Failed {
                message: "lost connection".into(),
                offer_explanation: false,
            }
        );
    }

    #[test]
    fn missing_programs_and_paths() {
        assert_eq!(
            classify("sl -l", &result(127, "bash: line 1: sl: command not found\n"), false),
            Verdict::CommandNotFound { name: "sl".into() }
        );
        assert_eq!(
            classify("cat nope", &result(1, "cat: nope: No such file or directory"), false),
            Verdict::PathNotFound
        );
    }

    #[test]
    fn generic_failures_honor_ignore_errors() {
        assert_eq!(
            classify("make", &result(2, "make: *** no rule"), true),
            Verdict::Failed {
                message: "make: *** no rule".into(),
                offer_explanation: false,
            }
        );
        assert_eq!(
            classify("false", &result(1, ""), false),
            Verdict::Failed {
                message: NO_ERROR_OUTPUT_MESSAGE.into(),
                offer_explanation: true,
            }
        );
    }

    #[test]
    fn stderr_with_zero_exit_fails_without_explanation() {
        assert_eq!(
            classify("noisy", &result(0, "fatal-ish warning"), false),
            Verdict::Failed {
                message: "fatal-ish warning".into(),
                offer_explanation: false,
            }
        );
        assert_eq!(classify("true", &result(0, ""), false), Verdict::Success);
    }

    #[test]
    fn missing_name_falls_back_to_program() {
        assert_eq!(missing_command_name("foo bar", "something odd"), "foo");
        assert_eq!(
            missing_command_name("./tool", "bash: ./tool: command not found"),
            "./tool"
        );
    }
}
