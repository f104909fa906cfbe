// [libs/domain/sandbox/src/jail.rs]
use gateway_error::{ErrorKind, GatewayError};
use std::path::{Path, PathBuf};

/// Resolves arguments that look like filesystem paths to an absolute
/// path under `root` and refuses anything that escapes it, including via
/// a symlink whose target points outside the jail.
pub struct Jail {
    root: PathBuf,
}

impl Jail {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A bare heuristic for "looks like a path": contains a `/` or `.`,
    /// or names a file that exists relative to the jail. Flags (leading
    /// `-`) are never treated as paths.
    pub fn looks_like_path(arg: &str) -> bool {
        !arg.starts_with('-') && (arg.contains('/') || arg.contains('.') || arg == "~")
    }

    /// Resolves `arg` against the jail root and verifies the result
    /// (after following any symlinks) stays inside it.
    pub fn resolve(&self, arg: &str) -> Result<PathBuf, GatewayError> {
        let candidate = Path::new(arg);
        let joined = if candidate.is_absolute() { candidate.to_path_buf() } else { self.root.join(candidate) };

        let normalized = normalize(&joined);
        if !normalized.starts_with(&self.root) {
            return Err(GatewayError::new(ErrorKind::SandboxViolation, "escapes_jail"));
        }

        if let Ok(canonical) = normalized.canonicalize() {
            if !canonical.starts_with(self.root.canonicalize().unwrap_or_else(|_| self.root.clone())) {
                return Err(GatewayError::new(ErrorKind::SandboxViolation, "escapes_jail"));
            }
        }

        Ok(normalized)
    }
}

/// Lexically collapses `.` and `..` components without touching the
/// filesystem, so a non-existent path can still be jail-checked before
/// the child process is spawned.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        use std::path::Component;
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_path_under_root() {
        let jail = Jail::new(PathBuf::from("/jail"));
        assert_eq!(jail.resolve("data/file.txt").unwrap(), PathBuf::from("/jail/data/file.txt"));
    }

    #[test]
    fn rejects_lexical_traversal_outside_root() {
        let jail = Jail::new(PathBuf::from("/jail"));
        let err = jail.resolve("../../../etc/passwd").unwrap_err();
        assert_eq!(err.message, "escapes_jail");
    }

    #[test]
    fn rejects_absolute_path_outside_root() {
        let jail = Jail::new(PathBuf::from("/jail"));
        let err = jail.resolve("/etc/passwd").unwrap_err();
        assert_eq!(err.message, "escapes_jail");
    }

    #[test]
    fn rejects_symlink_escaping_the_jail() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let root = dir.path().join("jail");
        std::fs::create_dir(&root).unwrap();
        let secret = outside.path().join("secret.txt");
        std::fs::write(&secret, "top secret").unwrap();

        #[cfg(unix)]
        std::os::unix::fs::symlink(&secret, root.join("link")).unwrap();

        let jail = Jail::new(root);
        #[cfg(unix)]
        {
            let err = jail.resolve("link").unwrap_err();
            assert_eq!(err.message, "escapes_jail");
        }
    }
}
