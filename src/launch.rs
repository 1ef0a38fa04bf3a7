//! Command resolution and process image replacement.

use std::ffi::{OsStr, OsString};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::env::split_entry;

/// Errors from resolving or executing the command
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("error while searching {command:?} in PATH: executable file not found")]
    NotFound { command: OsString },

    #[error("no command given")]
    MissingCommand,

    #[error("error while executing {program}: {source}")]
    Exec {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Find the executable for `command`.
///
/// A command containing `/` is taken as a path and returned unchanged.
/// Otherwise each directory of `search_path` is tried in order; empty
/// entries are skipped rather than meaning the working directory.
pub fn resolve_command(
    command: &OsStr,
    search_path: Option<&OsStr>,
) -> Result<PathBuf, LaunchError> {
    if command.is_empty() {
        return Err(LaunchError::MissingCommand);
    }
    if command.as_bytes().contains(&b'/') {
        return Ok(PathBuf::from(command));
    }

    let not_found = || LaunchError::NotFound {
        command: command.to_os_string(),
    };
    let search_path = search_path.ok_or_else(not_found)?;

    for dir in std::env::split_paths(search_path) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let candidate = dir.join(command);
        if is_executable(&candidate) {
            return Ok(candidate);
        }
    }

    Err(not_found())
}

fn is_executable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

/// Replace the current process image with `program`.
///
/// `args` is the complete argument vector, `args[0]` included, and `env`
/// the complete environment as `NAME=value` entries. Returns only if the
/// replacement failed.
///
/// `Command` keys the environment by name, so the new image receives the
/// entries sorted by name with duplicates collapsed to their last value,
/// which is the value the program would have read anyway. It is used over a
/// raw `execve` because it restores the default SIGPIPE disposition that the
/// Rust runtime ignores, so the command starts with the signal state a shell
/// would give it.
pub fn exec(program: &Path, args: &[OsString], env: &[OsString]) -> LaunchError {
    let Some((arg0, rest)) = args.split_first() else {
        return LaunchError::MissingCommand;
    };

    let mut command = Command::new(program);
    command
        .arg0(arg0)
        .args(rest)
        .env_clear()
        .envs(env.iter().map(|e| split_entry(e)));

    LaunchError::Exec {
        program: program.to_path_buf(),
        source: command.exec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn executable(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn test_resolves_through_search_path() {
        let empty = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let tool = executable(bin.path(), "mytool", 0o755);
        let search = std::env::join_paths([empty.path(), bin.path()]).unwrap();

        let resolved = resolve_command(OsStr::new("mytool"), Some(search.as_os_str())).unwrap();

        assert_eq!(resolved, tool);
    }

    #[test]
    fn test_qualified_command_is_not_searched() {
        let resolved = resolve_command(OsStr::new("/opt/x"), None).unwrap();
        assert_eq!(resolved, PathBuf::from("/opt/x"));

        let resolved = resolve_command(OsStr::new("./run"), Some(OsStr::new("/usr/bin"))).unwrap();
        assert_eq!(resolved, PathBuf::from("./run"));
    }

    #[test]
    fn test_first_match_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let expected = executable(first.path(), "dup", 0o700);
        executable(second.path(), "dup", 0o755);
        let search = std::env::join_paths([first.path(), second.path()]).unwrap();

        let resolved = resolve_command(OsStr::new("dup"), Some(search.as_os_str())).unwrap();

        assert_eq!(resolved, expected);
    }

    #[test]
    fn test_skips_non_executable_files() {
        let plain = tempfile::tempdir().unwrap();
        executable(plain.path(), "data", 0o644);

        let err = resolve_command(OsStr::new("data"), Some(plain.path().as_os_str())).unwrap_err();

        assert!(matches!(err, LaunchError::NotFound { .. }));
    }

    #[test]
    fn test_missing_search_path() {
        let err = resolve_command(OsStr::new("sh"), None).unwrap_err();
        assert!(matches!(err, LaunchError::NotFound { .. }));

        let err = resolve_command(OsStr::new(""), Some(OsStr::new("/bin"))).unwrap_err();
        assert!(matches!(err, LaunchError::MissingCommand));
    }

    #[test]
    fn test_exec_failure_returns() {
        let err = exec(
            Path::new("/nonexistent/proxy-exec-test"),
            &[OsString::from("proxy-exec-test")],
            &[],
        );

        match err {
            LaunchError::Exec { program, source } => {
                assert_eq!(program, PathBuf::from("/nonexistent/proxy-exec-test"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_exec_without_args() {
        assert!(matches!(exec(Path::new("/bin/true"), &[], &[]), LaunchError::MissingCommand));
    }
}
