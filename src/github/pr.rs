use serde::{Deserialize, Serialize};

use super::client::{gh_api, GhError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u32,
    pub title: String,
    pub state: String,
    pub head: Branch,
    pub base: Branch,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

pub async fn fetch_pr(repo: &str, pr_number: u32) -> Result<PullRequest, GhError> {
    let endpoint = format!("repos/{}/pulls/{}", repo, pr_number);
    let json = gh_api(&endpoint).await?;
    Ok(serde_json::from_value(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_request_decodes_ref_rename() {
        let json = serde_json::json!({
            "number": 42,
            "title": "Add signs",
            "state": "open",
            "head": { "ref": "feature", "sha": "abc123" },
            "base": { "ref": "main", "sha": "def456" },
            "user": { "login": "octocat" },
            "body": "ignored"
        });
        let pr: PullRequest = serde_json::from_value(json).unwrap();
        assert_eq!(pr.head.sha, "abc123");
        assert_eq!(pr.base.ref_name, "main");
    }
}
