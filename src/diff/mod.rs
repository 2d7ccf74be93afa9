//! Local diff source for the terminal viewer.
//!
//! The LEFT pane shows `<base>:<path>` from git, the RIGHT pane the working
//! tree file. Line numbers therefore match the ones GitHub uses for the
//! LEFT/RIGHT sides of a PR diff when `<base>` is the merge base.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

use crate::context::PullRequestContext;
use crate::github;

/// Both versions of one changed file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffFile {
    pub path: String,
    pub left: Vec<String>,
    pub right: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DiffSource {
    pub root: PathBuf,
    pub base: String,
}

/// Execute git and return stdout
/// Uses spawn_blocking to avoid blocking the tokio runtime
pub async fn git_command(root: Option<&Path>, args: &[&str]) -> Result<String> {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let root = root.map(Path::to_path_buf);

    tokio::task::spawn_blocking(move || {
        let mut command = Command::new("git");
        command.args(&args);
        if let Some(root) = root {
            command.current_dir(root);
        }
        let output = command
            .output()
            .context("Failed to execute git - is it installed?")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git {} failed: {}", args.join(" "), stderr.trim());
        }

        String::from_utf8(output.stdout).context("git output contains invalid UTF-8")
    })
    .await
    .context("spawn_blocking task panicked")?
}

/// Split file content into lines without terminators
pub fn split_lines(content: &str) -> Vec<String> {
    content.lines().map(String::from).collect()
}

/// Parse `git diff --name-only` output
pub fn parse_name_only(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

impl DiffSource {
    /// Resolve the repository root and the base revision.
    ///
    /// An explicit base wins. Otherwise, with a PR context, the merge base of
    /// the PR's base commit and `HEAD` is used; without one, `HEAD`.
    pub async fn resolve(
        explicit_base: Option<String>,
        pr: Option<&PullRequestContext>,
    ) -> Result<Self> {
        let root = git_command(None, &["rev-parse", "--show-toplevel"])
            .await
            .context("Not a git repository")?;
        let root = PathBuf::from(root.trim());

        let base = match (explicit_base, pr) {
            (Some(base), _) => base,
            (None, Some(pr)) => pr_merge_base(&root, pr).await,
            (None, None) => "HEAD".to_string(),
        };
        debug!("Diff base resolved to {}", base);

        Ok(Self { root, base })
    }

    pub async fn changed_files(&self) -> Result<Vec<String>> {
        let output = git_command(Some(&self.root), &["diff", "--name-only", &self.base]).await?;
        Ok(parse_name_only(&output))
    }

    /// Load both sides of `path`. A side that does not exist (added or
    /// deleted file) is empty.
    pub async fn load(&self, path: &str) -> DiffFile {
        let spec = format!("{}:{}", self.base, path);
        let left = match git_command(Some(&self.root), &["show", &spec]).await {
            Ok(content) => split_lines(&content),
            Err(e) => {
                debug!("No base version of {}: {}", path, e);
                Vec::new()
            }
        };
        let right = match tokio::fs::read_to_string(self.root.join(path)).await {
            Ok(content) => split_lines(&content),
            Err(e) => {
                debug!("No working tree version of {}: {}", path, e);
                Vec::new()
            }
        };
        DiffFile {
            path: path.to_string(),
            left,
            right,
        }
    }
}

async fn pr_merge_base(root: &Path, pr: &PullRequestContext) -> String {
    let base_sha = match github::fetch_pr(&pr.repo, pr.number).await {
        Ok(fetched) => fetched.base.sha,
        Err(e) => {
            warn!("Failed to fetch PR #{}: {}", pr.number, e);
            return "HEAD".to_string();
        }
    };
    match git_command(Some(root), &["merge-base", &base_sha, "HEAD"]).await {
        Ok(sha) if !sha.trim().is_empty() => sha.trim().to_string(),
        Ok(_) => base_sha,
        Err(e) => {
            // base が未 fetch の場合など
            warn!("git merge-base failed, using PR base sha: {}", e);
            base_sha
        }
    }
}
