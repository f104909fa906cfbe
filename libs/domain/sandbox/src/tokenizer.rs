// [libs/domain/sandbox/src/tokenizer.rs]
use gateway_error::{ErrorKind, GatewayError};

/// Shell metacharacters that make a command ambiguous to parse without a
/// shell, and therefore a vector for injection if one were ever used
const METACHARACTERS: &[char] = &['|', '&', ';', '$', '`', '(', ')', '>', '<', '#'];

/// Splits a command line on whitespace and rejects empty input or any
/// token containing a shell metacharacter. No shell is ever invoked —
/// this is a plain whitespace split, not shell-word parsing, so quoting
/// rules don't apply.
pub fn tokenize(command: &str) -> Result<Vec<String>, GatewayError> {
    let tokens: Vec<String> = command.split_whitespace().map(str::to_string).collect();
    if tokens.is_empty() {
        return Err(GatewayError::new(ErrorKind::SandboxViolation, "empty_command"));
    }
    for token in &tokens {
        if token.chars().any(|c| METACHARACTERS.contains(&c)) {
            return Err(GatewayError::new(ErrorKind::SandboxViolation, "metacharacters"));
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(tokenize("git log --oneline").unwrap(), vec!["git", "log", "--oneline"]);
    }

    #[test]
    fn rejects_empty_command() {
        let err = tokenize(" ").unwrap_err();
        assert_eq!(err.message, "empty_command");
    }

    #[test]
    fn rejects_pipe() {
        let err = tokenize("ls | cat").unwrap_err();
        assert_eq!(err.message, "metacharacters");
    }

    #[test]
    fn rejects_each_metacharacter() {
        for ch in METACHARACTERS {
            let command = format!("echo a{ch}b");
            assert_eq!(tokenize(&command).unwrap_err().message, "metacharacters", "char {ch} should be rejected");
        }
    }
}
