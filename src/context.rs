//! Pull request context resolved from the process environment.

use std::env;
use thiserror::Error;

/// Default environment variable holding the PR number
pub const DEFAULT_NUMBER_ENV: &str = "PRSIGN_PR_NUMBER";
/// Default environment variable holding `owner/repo`
pub const DEFAULT_REPO_ENV: &str = "PRSIGN_REPO";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("{0} is not set")]
    Missing(String),
    #[error("{var} is not a valid PR number: {value}")]
    InvalidNumber { var: String, value: String },
    #[error("{var} must be in owner/repo form: {value}")]
    InvalidRepo { var: String, value: String },
}

/// The pull request the session reviews. Read-only once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestContext {
    pub number: u32,
    pub repo: String,
}

impl PullRequestContext {
    pub fn new(number: u32, repo: impl Into<String>) -> Self {
        Self {
            number,
            repo: repo.into(),
        }
    }

    /// Read both identifiers from the environment.
    pub fn from_env(number_var: &str, repo_var: &str) -> Result<Self, ContextError> {
        let number = read_var(number_var)?;
        let repo = read_var(repo_var)?;
        Self::parse(number_var, &number, repo_var, &repo)
    }

    /// Merge explicit values (CLI flags) over the environment.
    pub fn resolve(
        number: Option<u32>,
        repo: Option<String>,
        number_var: &str,
        repo_var: &str,
    ) -> Result<Self, ContextError> {
        if number.is_none() && repo.is_none() {
            return Self::from_env(number_var, repo_var);
        }
        let number = match number {
            Some(n) => n.to_string(),
            None => read_var(number_var)?,
        };
        let repo = match repo {
            Some(r) => r,
            None => read_var(repo_var)?,
        };
        Self::parse(number_var, &number, repo_var, &repo)
    }

    fn parse(
        number_var: &str,
        number: &str,
        repo_var: &str,
        repo: &str,
    ) -> Result<Self, ContextError> {
        let parsed = number
            .trim()
            .trim_start_matches('#')
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ContextError::InvalidNumber {
                var: number_var.to_string(),
                value: number.to_string(),
            })?;

        let repo = repo.trim();
        let valid_repo = repo
            .split_once('/')
            .is_some_and(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'));
        if !valid_repo {
            return Err(ContextError::InvalidRepo {
                var: repo_var.to_string(),
                value: repo.to_string(),
            });
        }

        Ok(Self::new(parsed, repo))
    }
}

fn read_var(name: &str) -> Result<String, ContextError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ContextError::Missing(name.to_string()))
}
