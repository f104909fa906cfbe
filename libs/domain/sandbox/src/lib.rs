// [libs/domain/sandbox/src/lib.rs]
//! Executes a small allowlisted set of read-only tool commands without a
//! shell, inside a filesystem jail, with output redaction and an audit
//! trail.

mod allowlist;
mod audit;
mod exec;
mod jail;
mod redact;
mod tokenizer;

pub use allowlist::{Allowlist, BinaryPolicy};
pub use audit::{AuditAction, AuditLog, AuditRecord};
pub use exec::ExecOutput;
pub use jail::Jail;

use gateway_error::GatewayError;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SandboxOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub truncated: bool,
}

pub struct ToolSandboxSettings {
    pub jail_root: PathBuf,
    pub timeout: Duration,
    pub max_output_bytes: usize,
    pub known_secrets: Vec<String>,
}

pub struct ToolSandbox {
    allowlist: Allowlist,
    jail: Jail,
    audit: AuditLog,
    settings: ToolSandboxSettings,
}

impl ToolSandbox {
    pub fn new(allowlist: Allowlist, audit: AuditLog, settings: ToolSandboxSettings) -> Self {
        let jail = Jail::new(settings.jail_root.clone());
        Self { allowlist, jail, audit, settings }
    }

    /// Runs `command` end to end: tokenize, allowlist, jail every
    /// path-looking argument, spawn with no shell, redact the output,
    /// and audit the decision either way.
    pub async fn run(&self, command: &str) -> Result<SandboxOutput, GatewayError> {
        let started = Instant::now();
        match self.execute(command).await {
            Ok(output) => {
                let _ = self.audit.record(
                    AuditAction::Allow,
                    command,
                    &[],
                    started.elapsed(),
                    output.stdout.len() + output.stderr.len(),
                    None,
                );
                Ok(output)
            }
            Err(err) => {
                let _ = self.audit.record(AuditAction::Deny, command, &[], started.elapsed(), 0, Some(err.message.clone()));
                Err(err)
            }
        }
    }

    async fn execute(&self, command: &str) -> Result<SandboxOutput, GatewayError> {
        let tokens = tokenizer::tokenize(command)?;
        let binary = &tokens[0];
        let args = &tokens[1..];

        self.allowlist.check(binary, args)?;

        for arg in args {
            if Jail::looks_like_path(arg) {
                self.jail.resolve(arg)?;
            }
        }

        let output = exec::run(binary, args, self.jail.root(), self.settings.timeout, self.settings.max_output_bytes).await?;

        let stdout = redact::redact(&String::from_utf8_lossy(&output.stdout), &self.settings.known_secrets);
        let stderr = redact::redact(&String::from_utf8_lossy(&output.stderr), &self.settings.known_secrets);

        Ok(SandboxOutput { exit_code: output.exit_code, stdout, stderr, truncated: output.truncated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sandbox(dir: &std::path::Path) -> ToolSandbox {
        let mut binaries = HashMap::new();
        binaries.insert("git".to_string(), BinaryPolicy::multi_verb(&["log", "status"], &["-c"]));
        binaries.insert("cat".to_string(), BinaryPolicy::single_verb(&[]));
        binaries.insert("echo".to_string(), BinaryPolicy::single_verb(&[]));

        let audit = AuditLog::new(dir.join("audit.jsonl"), dir.join("archive"), 1024 * 1024);
        ToolSandbox::new(
            Allowlist::new(binaries),
            audit,
            ToolSandboxSettings {
                jail_root: dir.to_path_buf(),
                timeout: Duration::from_secs(5),
                max_output_bytes: 4096,
                known_secrets: vec!["s3cr3t".to_string()],
            },
        )
    }

    #[tokio::test]
    async fn runs_an_allowed_binary_and_redacts_known_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = sandbox(dir.path());
        let output = sandbox.run("echo s3cr3t").await.unwrap();
        assert_eq!(output.exit_code, 0);
        assert!(output.stdout.contains("[REDACTED]"));
        assert!(!output.stdout.contains("s3cr3t"));
    }

    #[tokio::test]
    async fn denies_a_non_allowlisted_subcommand() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = sandbox(dir.path());
        let err = sandbox.run("git push").await.unwrap_err();
        assert_eq!(err.message, "subcommand_not_allowed");
    }

    #[tokio::test]
    async fn denies_shell_metacharacters() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = sandbox(dir.path());
        let err = sandbox.run("cat file.txt | cat").await.unwrap_err();
        assert_eq!(err.message, "metacharacters");
    }

    #[tokio::test]
    async fn denies_a_path_escaping_the_jail() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = sandbox(dir.path());
        let err = sandbox.run("cat../../../etc/passwd").await.unwrap_err();
        assert_eq!(err.message, "escapes_jail");
    }

    #[tokio::test]
    async fn an_allow_and_a_deny_both_land_in_the_audit_log() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = sandbox(dir.path());
        let _ = sandbox.run("echo hi").await;
        let _ = sandbox.run("git push").await;
        let contents = std::fs::read_to_string(dir.path().join("audit.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("\"allow\""));
        assert!(contents.contains("\"deny\""));
    }
}
