// [libs/domain/sandbox/src/redact.rs]
use regex::Regex;
use std::sync::OnceLock;

const REDACTED: &str = "[REDACTED]";

/// Known provider-key shapes worth pattern-matching even when the exact
/// value isn't in the known-secrets list: OpenAI-
/// style `sk-...`, Anthropic-style `sk-ant-...`, and GitHub tokens.
fn patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
            vec![
                Regex::new(r"sk-ant-[A-Za-z0-9_-]{20,}").unwrap(),
                Regex::new(r"sk-[A-Za-z0-9]{20,}").unwrap(),
                Regex::new(r"gh[pousr]_[A-Za-z0-9]{20,}").unwrap(),
            ]
    })
}

/// Redacts `known_secrets` verbatim, then sweeps the result for
/// pattern-matched provider-key shapes.
pub fn redact(text: &str, known_secrets: &[String]) -> String {
    let mut redacted = text.to_string();
    for secret in known_secrets {
        if !secret.is_empty() {
            redacted = redacted.replace(secret.as_str(), REDACTED);
        }
    }
    for pattern in patterns() {
        redacted = pattern.replace_all(&redacted, REDACTED).into_owned();
    }
    redacted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_a_known_secret_value() {
        let out = redact("token=abc123xyz", &["abc123xyz".to_string()]);
        assert_eq!(out, "token=[REDACTED]");
    }

    #[test]
    fn redacts_openai_shaped_keys_without_being_in_the_known_list() {
        let out = redact("leaked sk-abcdefghijklmnopqrstuvwx here", &[]);
        assert_eq!(out, "leaked [REDACTED] here");
    }

    #[test]
    fn redacts_anthropic_shaped_keys() {
        let out = redact("key: sk-ant-REDACTED", &[]);
        assert_eq!(out, "key: [REDACTED]");
    }

    #[test]
    fn leaves_unrelated_text_untouched() {
        assert_eq!(redact("ordinary stdout line", &[]), "ordinary stdout line");
    }
}
