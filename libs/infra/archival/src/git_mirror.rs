// [libs/infra/archival/src/git_mirror.rs]
use gateway_error::{ErrorKind, GatewayError};
use std::path::{Path, PathBuf};

/// Commits a snapshot of archived files to an immutable append-only
/// branch in an external bare repository, via a temporary worktree so
/// the archival worker never switches the live checkout's branch out
/// from under anything else running against it. Push is fast-forward
/// only: a divergent remote tip fails the push rather than force-pushing
/// over history, since the whole point of this target is to be an
/// append-only mirror.
pub struct GitMirror {
    remote_url: String,
    branch: String,
}

impl GitMirror {
    pub fn new(remote_url: impl Into<String>, branch: impl Into<String>) -> Self {
        Self { remote_url: remote_url.into(), branch: branch.into() }
    }

    /// Clones `branch` (or initializes it if the remote has no history
    /// yet) into a fresh temporary worktree, copies `files` into it under
    /// their given relative paths, commits, and pushes fast-forward only.
    pub fn commit_snapshot(&self, files: &[(PathBuf, Vec<u8>)]) -> Result<String, GatewayError> {
        let workdir = tempfile::tempdir().map_err(GatewayError::from)?;
        let repo = self.open_or_init(workdir.path())?;

        for (rel_path, bytes) in files {
            let dest = workdir.path().join(rel_path);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&dest, bytes)?;
        }

        let commit_id = self.commit_all(&repo, "archival snapshot")?;
        self.push_fast_forward(&repo)?;
        Ok(commit_id)
    }

    fn open_or_init(&self, workdir: &Path) -> Result<git2::Repository, GatewayError> {
        match git2::Repository::clone(&self.remote_url, workdir) {
            Ok(repo) => {
                self.checkout_or_orphan_branch(&repo)?;
                Ok(repo)
            }
            Err(_) => {
                let repo = git2::Repository::init(workdir).map_err(git_err)?;
                repo.remote("origin", &self.remote_url).map_err(git_err)?;
                Ok(repo)
            }
        }
    }

    fn checkout_or_orphan_branch(&self, repo: &git2::Repository) -> Result<(), GatewayError> {
        let branch_ref = format!("refs/heads/{}", self.branch);
        if repo.find_reference(&branch_ref).is_ok() {
            repo.set_head(&branch_ref).map_err(git_err)?;
            repo.checkout_head(Some(git2::build::CheckoutBuilder::new().force())).map_err(git_err)?;
        }
        Ok(())
    }

    fn commit_all(&self, repo: &git2::Repository, message: &str) -> Result<String, GatewayError> {
        let mut index = repo.index().map_err(git_err)?;
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None).map_err(git_err)?;
        index.write().map_err(git_err)?;
        let tree_id = index.write_tree().map_err(git_err)?;
        let tree = repo.find_tree(tree_id).map_err(git_err)?;
        let signature = git2::Signature::now("archival-sync", "archival-sync@gateway.local").map_err(git_err)?;

        let parents: Vec<git2::Commit> = match repo.head().and_then(|h| h.peel_to_commit()) {
            Ok(commit) => vec![commit],
            Err(_) => Vec::new(),
        };
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

        let branch_ref = format!("refs/heads/{}", self.branch);
        let commit_id = repo.commit(Some(&branch_ref), &signature, &signature, message, &tree, &parent_refs).map_err(git_err)?;
        Ok(commit_id.to_string())
    }

    fn push_fast_forward(&self, repo: &git2::Repository) -> Result<(), GatewayError> {
        let mut remote = repo.find_remote("origin").map_err(git_err)?;
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}", branch = self.branch);
        let mut push_options = git2::PushOptions::new();
        remote.push(&[refspec.as_str()], Some(&mut push_options)).map_err(|e| {
            GatewayError::new(ErrorKind::Io, format!("archival git push rejected (remote diverged, not fast-forward?): {e}"))
        })
    }
}

fn git_err(e: git2::Error) -> GatewayError {
    GatewayError::new(ErrorKind::Io, format!("archival git mirror error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_snapshot_writes_files_into_a_fresh_bare_remote() {
        let bare_dir = tempfile::tempdir().unwrap();
        git2::Repository::init_bare(bare_dir.path()).unwrap();

        let mirror = GitMirror::new(bare_dir.path().to_str().unwrap(), "archive");
        let files = vec![(PathBuf::from("segments/0001.wal"), b"hello".to_vec())];
        let commit_id = mirror.commit_snapshot(&files).unwrap();
        assert_eq!(commit_id.len(), 40);
    }

    #[test]
    fn second_snapshot_fast_forwards_on_top_of_the_first() {
        let bare_dir = tempfile::tempdir().unwrap();
        git2::Repository::init_bare(bare_dir.path()).unwrap();
        let mirror = GitMirror::new(bare_dir.path().to_str().unwrap(), "archive");

        let first = mirror.commit_snapshot(&[(PathBuf::from("a.txt"), b"one".to_vec())]).unwrap();
        let second = mirror.commit_snapshot(&[(PathBuf::from("b.txt"), b"two".to_vec())]).unwrap();
        assert_ne!(first, second);
    }
}
