//! Command-safety gate applied before a language is registered

use thiserror::Error;

/// Commands may only start with one of these
const ALLOWED_PREFIXES: &[&str] = &["gcc", "g++", "python", "python3", "timeout", "/usr/bin/time", "./"];

/// Shell metacharacters, matched anywhere in the command
const FORBIDDEN_SEQUENCES: &[&str] = &[";", "&&", "|", "`", "$(", ">", ">>", "<", "\n"];

/// Destructive or network utilities, matched as whole words
const FORBIDDEN_WORDS: &[&str] = &[
    "rm", "shutdown", "reboot", "mkfs", "dd", "kill", "init", "telnet", "ftp", "nc", "ncat", "wget",
    "curl", "scp", "chmod", "chown", "echo", "cat", "nano", "vi", "docker", "mount", "umount", "sh",
    "bash",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRejected {
    #[error("command is empty")]
    Empty,
    #[error("command contains forbidden sequence `{0}`")]
    ForbiddenSequence(&'static str),
    #[error("command invokes forbidden program `{0}`")]
    ForbiddenWord(String),
    #[error("command must start with one of {ALLOWED_PREFIXES:?}")]
    NotAllowListed,
}

/// Validate an optional command; `None` (no step) is always accepted.
pub fn check_optional_command(command: Option<&str>) -> Result<(), CommandRejected> {
    match command {
        Some(cmd) => check_command(cmd),
        None => Ok(()),
    }
}

/// Validate a compile or run command line
pub fn check_command(command: &str) -> Result<(), CommandRejected> {
    let command = command.trim();
    if command.is_empty() {
        return Err(CommandRejected::Empty);
    }

    if let Some(seq) = FORBIDDEN_SEQUENCES.iter().copied().find(|seq| command.contains(seq)) {
        return Err(CommandRejected::ForbiddenSequence(seq));
    }

    // Words are split on anything that is not part of a program name, so
    // `-std=c++14` or `main.cpp` never trip `dd` / `cat`.
    for word in command.split(|c: char| c.is_whitespace() || c == '/' || c == '=') {
        if FORBIDDEN_WORDS.contains(&word) {
            return Err(CommandRejected::ForbiddenWord(word.to_string()));
        }
    }

    let first = command.split_whitespace().next().unwrap_or_default();
    let allowed = ALLOWED_PREFIXES.iter().any(|prefix| {
        first == *prefix
            || (prefix.ends_with('/') && first.starts_with(prefix))
            || first.starts_with(&format!("{prefix}."))
    });
    if allowed {
        Ok(())
    } else {
        Err(CommandRejected::NotAllowListed)
    }
}
