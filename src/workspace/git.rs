use std::path::Path;

use git2::{BranchType, Oid, Repository};

use crate::error::{AppError, Result};
use crate::platform::types;

/// Minimum length of a commit SHA accepted on the command line.
pub const MIN_SHA_LEN: usize = 7;

/// Parse the owner and name out of a GitHub remote URL.
///
/// Accepts `git@github.com:o/r`, `https://github.com/o/r` and
/// `ssh://git@github.com/o/r`, each with or without a `.git` suffix.
pub fn parse_github_url(url: &str) -> Option<types::Repository> {
    let url = url.trim();
    let url = url.strip_suffix(".git").unwrap_or(url);

    let path = ["git@github.com:", "https://github.com/", "ssh://git@github.com/"]
        .iter()
        .find_map(|prefix| url.strip_prefix(prefix))?;

    let mut parts = path.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
            Some(types::Repository::new(owner, name))
        }
        _ => None,
    }
}

/// Reject SHAs that are too short or not hex.
pub fn validate_commit_sha(sha: &str) -> Result<()> {
    if sha.len() < MIN_SHA_LEN || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::Repository(format!("invalid commit SHA: {sha}")));
    }
    Ok(())
}

/// Resolve the GitHub repository of the git checkout containing `dir`.
pub async fn repository_info(dir: &Path) -> Result<types::Repository> {
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::discover(&dir)
            .map_err(|e| AppError::Repository(format!("not a git repository: {}", e.message())))?;
        let remote = repo
            .find_remote("origin")
            .map_err(|e| AppError::Repository(format!("no `origin` remote: {}", e.message())))?;
        let url = remote
            .url()
            .ok_or_else(|| AppError::Repository("origin URL is not valid UTF-8".to_string()))?;

        parse_github_url(url)
            .ok_or_else(|| AppError::Repository(format!("failed to parse GitHub URL: {url}")))
    })
    .await
    .map_err(|e| AppError::Git(format!("Repository-info task panicked: {e}")))?
}

/// The HEAD commit of the checkout containing `dir`, which must already be
/// contained in some remote-tracking branch.
pub async fn current_commit(dir: &Path) -> Result<String> {
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let repo = Repository::discover(&dir)
            .map_err(|e| AppError::Repository(format!("not a git repository: {}", e.message())))?;
        let commit = repo.head()?.peel_to_commit()?.id();
        let sha = commit.to_string();

        if !is_pushed(&repo, commit)? {
            tracing::warn!(sha = %&sha[..8], "Commit not found in remote branches");
            return Err(AppError::NotPushed(sha[..8].to_string()));
        }

        Ok(sha)
    })
    .await
    .map_err(|e| AppError::Git(format!("Current-commit task panicked: {e}")))?
}

/// Whether any `refs/remotes/*` branch contains `commit`.
fn is_pushed(repo: &Repository, commit: Oid) -> Result<bool> {
    for branch in repo.branches(Some(BranchType::Remote))? {
        let (branch, _) = branch?;
        // Symbolic refs such as origin/HEAD have no direct target.
        let Some(tip) = branch.get().target() else {
            continue;
        };
        if tip == commit || repo.graph_descendant_of(tip, commit)? {
            return Ok(true);
        }
    }
    Ok(false)
}
