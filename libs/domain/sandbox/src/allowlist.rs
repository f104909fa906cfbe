// [libs/domain/sandbox/src/allowlist.rs]
use gateway_error::{ErrorKind, GatewayError};
use std::collections::{HashMap, HashSet};

/// Allowlist policy for one binary. Single-verb
/// tools (`cat`, `ls`) have no subcommand requirement; multi-verb tools
/// (`git`) require the first argument to name an allowed subcommand.
#[derive(Debug, Clone)]
pub struct BinaryPolicy {
    pub allowed_subcommands: Option<HashSet<String>>,
    pub denied_flags: HashSet<String>,
}

impl BinaryPolicy {
    pub fn single_verb(denied_flags: &[&str]) -> Self {
        Self { allowed_subcommands: None, denied_flags: denied_flags.iter().map(|s| s.to_string()).collect() }
    }

    pub fn multi_verb(allowed_subcommands: &[&str], denied_flags: &[&str]) -> Self {
        Self {
            allowed_subcommands: Some(allowed_subcommands.iter().map(|s| s.to_string()).collect()),
            denied_flags: denied_flags.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub struct Allowlist {
    binaries: HashMap<String, BinaryPolicy>,
}

impl Allowlist {
    pub fn new(binaries: HashMap<String, BinaryPolicy>) -> Self {
        Self { binaries }
    }

    /// Checks `binary` plus its remaining arguments against the
    /// allowlist. Returns the arguments with any leading subcommand
    /// still included, so the caller can pass them straight to
    /// `Command::args`.
    pub fn check(&self, binary: &str, args: &[String]) -> Result<(), GatewayError> {
        let policy = self.binaries.get(binary).ok_or_else(|| GatewayError::new(ErrorKind::SandboxViolation, "binary_not_allowed"))?;

        if let Some(allowed) = &policy.allowed_subcommands {
            let subcommand = args.first().ok_or_else(|| GatewayError::new(ErrorKind::SandboxViolation, "subcommand_not_allowed"))?;
            if !allowed.contains(subcommand.as_str()) {
                return Err(GatewayError::new(ErrorKind::SandboxViolation, "subcommand_not_allowed"));
            }
        }

        for arg in args {
            for denied in &policy.denied_flags {
                if arg == denied || arg.starts_with(&format!("{denied}=")) {
                    return Err(GatewayError::new(ErrorKind::SandboxViolation, "dangerous_flag"));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowlist() -> Allowlist {
        let mut binaries = HashMap::new();
        binaries.insert("git".to_string(), BinaryPolicy::multi_verb(&["log", "status", "diff", "show"], &["-c", "--exec"]));
        binaries.insert("cat".to_string(), BinaryPolicy::single_verb(&[]));
        Allowlist::new(binaries)
    }

    #[test]
    fn allows_allowlisted_subcommand() {
        allowlist().check("git", &["log".to_string(), "--oneline".to_string()]).unwrap();
    }

    #[test]
    fn denies_non_allowlisted_subcommand() {
        let err = allowlist().check("git", &["push".to_string()]).unwrap_err();
        assert_eq!(err.message, "subcommand_not_allowed");
    }

    #[test]
    fn denies_unknown_binary() {
        let err = allowlist().check("rm", &["-rf".to_string()]).unwrap_err();
        assert_eq!(err.message, "binary_not_allowed");
    }

    #[test]
    fn denies_dangerous_flag_space_form() {
        let err = allowlist().check("git", &["log".to_string(), "-c".to_string(), "core.pager=evil".to_string()]).unwrap_err();
        assert_eq!(err.message, "dangerous_flag");
    }

    #[test]
    fn denies_dangerous_flag_equals_form() {
        let err = allowlist().check("git", &["log".to_string(), "--exec=evil".to_string()]).unwrap_err();
        assert_eq!(err.message, "dangerous_flag");
    }
}
