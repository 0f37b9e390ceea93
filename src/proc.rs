//! Child-process invocation for compilers, archivers, and linkers.
//!
//! Output from the child's stdout and stderr is captured into a single
//! string, since compiler diagnostics may arrive on either stream and
//! are treated uniformly. [`quote_command`] renders an argv as a shell
//! string for logging and for the command column of the file-deps
//! database (command equality is compared on this rendering).

use std::process::Command;

use crate::error::Result;

/// Result of running a child process to completion.
#[derive(Debug)]
pub struct ProcResult {
    /// Exit code, or `None` if the process was killed by a signal.
    pub retc: Option<i32>,
    /// Combined stdout + stderr text.
    pub output: String,
}

impl ProcResult {
    /// Whether the process exited successfully.
    pub fn okay(&self) -> bool {
        self.retc == Some(0)
    }
}

/// Run `argv` to completion, capturing combined output.
///
/// The first element is the program; the working directory is
/// inherited. Spawning failures (e.g. missing executables) surface as
/// `Error::Io`.
pub fn run_proc(argv: &[String]) -> Result<ProcResult> {
    let (program, args) = argv
        .split_first()
        .expect("attempted to run an empty command line");
    let out = Command::new(program).args(args).output()?;

    let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
    output.push_str(&String::from_utf8_lossy(&out.stderr));

    Ok(ProcResult {
        retc: out.status.code(),
        output,
    })
}

fn needs_quoting(s: &str) -> bool {
    let okay_chars = "@%-+=:,./|_";
    let all_okay = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || okay_chars.contains(c));
    !all_okay
}

/// Quote a single argument for display if it contains shell-unsafe
/// characters.
pub fn quote_argument(s: &str) -> String {
    if !needs_quoting(s) {
        return s.to_string();
    }
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Render an argv as a single displayable/persistable string.
pub fn quote_command(argv: &[String]) -> String {
    argv.iter()
        .map(|a| quote_argument(a))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_quoting() {
        assert!(!needs_quoting("gcc"));
        assert!(!needs_quoting("-o"));
        assert!(!needs_quoting("src/foo.cpp"));
        assert!(!needs_quoting("a@1.2.3"));
        assert!(needs_quoting("has space"));
        assert!(needs_quoting("semi;colon"));
        assert!(needs_quoting(""));
    }

    #[test]
    fn test_quote_argument() {
        assert_eq!(quote_argument("plain"), "plain");
        assert_eq!(quote_argument("has space"), "\"has space\"");
        assert_eq!(quote_argument("say \"hi\""), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn test_quote_command() {
        let argv = vec![
            "g++".to_string(),
            "-c".to_string(),
            "my file.cpp".to_string(),
        ];
        assert_eq!(quote_command(&argv), "g++ -c \"my file.cpp\"");
    }

    #[test]
    fn test_run_proc_captures_output() {
        let argv = vec!["echo".to_string(), "hello".to_string()];
        let res = run_proc(&argv).unwrap();
        assert!(res.okay());
        assert_eq!(res.output.trim(), "hello");
    }

    #[test]
    fn test_run_proc_nonzero_exit() {
        let argv = vec!["false".to_string()];
        let res = run_proc(&argv).unwrap();
        assert!(!res.okay());
        assert_eq!(res.retc, Some(1));
    }
}
