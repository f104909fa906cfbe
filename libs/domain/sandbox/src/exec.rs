// [libs/domain/sandbox/src/exec.rs]
use gateway_error::{ErrorKind, GatewayError};
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub truncated: bool,
    pub duration: Duration,
}

const TRUNCATION_MARKER: &[u8] = b"\n...[truncated]";

/// Spawns `binary args...` with no shell, a minimal environment, the
/// jail as working directory, a hard timeout, and a maximum-output cap.
/// On unix the child is placed in its own process group so a timeout
/// kill takes the whole tree with it, not just the immediate child.
pub async fn run(
    binary: &str,
    args: &[String],
    jail_root: &Path,
    timeout: Duration,
    max_output_bytes: usize,
) -> Result<ExecOutput, GatewayError> {
    let mut command = Command::new(binary);
    command.args(args);
    command.current_dir(jail_root);
    command.env_clear();
    command.env("PATH", "/usr/bin:/bin");
    command.stdin(std::process::Stdio::null());
    command.stdout(std::process::Stdio::piped());
    command.stderr(std::process::Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let started = tokio::time::Instant::now();
    let child = command.spawn().map_err(|err| GatewayError::new(ErrorKind::SandboxViolation, format!("spawn failed: {err}")))?;

    #[cfg(unix)]
    let pgid = child.id().map(|pid| pid as libc::pid_t);

    let wait_result = tokio::time::timeout(timeout, child.wait_with_output()).await;

    let output = match wait_result {
        Ok(result) => result.map_err(GatewayError::from)?,
        Err(_) => {
            #[cfg(unix)]
            kill_tree(pgid);
            return Err(GatewayError::new(ErrorKind::SandboxTimeout, "execution timed out"));
        }
    };

    let (stdout, stdout_truncated) = cap(output.stdout, max_output_bytes);
    let (stderr, stderr_truncated) = cap(output.stderr, max_output_bytes);

    Ok(ExecOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout,
            stderr,
            truncated: stdout_truncated || stderr_truncated,
            duration: started.elapsed(),
    })
}

#[cfg(unix)]
fn kill_tree(pgid: Option<libc::pid_t>) {
    if let Some(pgid) = pgid {
        // SAFETY: signalling a process group id this process itself
        // created via `process_group(0)`; no memory is touched.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
}

fn cap(mut bytes: Vec<u8>, max: usize) -> (Vec<u8>, bool) {
    if bytes.len() <= max {
        return (bytes, false);
    }
    bytes.truncate(max);
    bytes.extend_from_slice(TRUNCATION_MARKER);
    (bytes, true)
}
