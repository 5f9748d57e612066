use std::ffi::OsStr;

/// Render a command the way it could be pasted into a shell
pub fn command_to_string(cmd: &std::process::Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote one word for /bin/sh. Plain words are passed through
pub fn shell_quote<S: AsRef<OsStr>>(word: S) -> String {
    let word = word.as_ref().to_string_lossy();
    let is_plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=,:+@%".contains(c));
    if is_plain {
        word.into_owned()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("--trim-length"), "--trim-length");
        assert_eq!(shell_quote("/a b/c"), "'/a b/c'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_command_to_string() {
        let mut cmd = std::process::Command::new("sbatch");
        cmd.arg("lane 0.sh");
        assert_eq!(command_to_string(&cmd), "sbatch 'lane 0.sh'");
    }
}
