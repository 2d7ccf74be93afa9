use std::process::Command;
use thiserror::Error;

/// Failure of a single `gh` invocation.
#[derive(Debug, Error)]
pub enum GhError {
    #[error("Failed to execute gh CLI - is it installed? ({0})")]
    Spawn(String),
    /// Non-zero exit. `output` holds stdout and stderr combined, for display.
    #[error("gh command failed ({status}): {output}")]
    Failed { status: String, output: String },
    #[error("gh output contains invalid UTF-8")]
    InvalidUtf8,
    #[error("Failed to parse gh output as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("spawn_blocking task panicked: {0}")]
    Join(String),
}

/// Execute gh CLI command and return stdout
/// Uses spawn_blocking to avoid blocking the tokio runtime
pub async fn gh_command(args: &[&str]) -> Result<String, GhError> {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();

    tokio::task::spawn_blocking(move || {
        let output = Command::new("gh")
            .args(&args)
            .output()
            .map_err(|e| GhError::Spawn(e.to_string()))?;

        if !output.status.success() {
            return Err(GhError::Failed {
                status: output.status.to_string(),
                output: combined_output(&output.stdout, &output.stderr),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| GhError::InvalidUtf8)
    })
    .await
    .map_err(|e| GhError::Join(e.to_string()))?
}

/// stdout と stderr を結合（どちらかが空なら片方のみ）
fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    [stdout.trim(), stderr.trim()]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Execute gh api command with JSON output
pub async fn gh_api(endpoint: &str) -> Result<serde_json::Value, GhError> {
    let output = gh_command(&["api", endpoint]).await?;
    Ok(serde_json::from_str(&output)?)
}

/// Execute gh api with `--paginate --slurp` and return the raw stdout.
///
/// The output is an array of pages, each page being the JSON array the
/// endpoint returned. Decoding is left to the caller so that a malformed
/// response can be tolerated rather than failing the whole request.
pub async fn gh_api_paginate_raw(endpoint: &str) -> Result<String, GhError> {
    gh_command(&["api", "--paginate", "--slurp", endpoint]).await
}

/// HTTP method passed to `gh api --method`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Post,
    Patch,
    Delete,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// Field type for gh api command
pub enum FieldValue<'a> {
    /// String field (-f)
    String(&'a str),
    /// Raw/typed field (-F) - for integers, booleans, null
    Raw(&'a str),
}

/// Build the argument list for `gh api --method <m> <endpoint> [fields]`
pub fn build_api_args(
    method: Method,
    endpoint: &str,
    fields: &[(&str, FieldValue<'_>)],
) -> Vec<String> {
    let mut args = vec![
        "api".to_string(),
        "--method".to_string(),
        method.as_str().to_string(),
        endpoint.to_string(),
    ];
    for (key, value) in fields {
        match value {
            FieldValue::String(v) => {
                args.push("-f".to_string());
                args.push(format!("{}={}", key, v));
            }
            FieldValue::Raw(v) => {
                args.push("-F".to_string());
                args.push(format!("{}={}", key, v));
            }
        }
    }
    args
}

/// Execute gh api with method and fields, returning raw stdout.
/// DELETE returns an empty body, so no JSON decoding happens here.
pub async fn gh_api_send(
    method: Method,
    endpoint: &str,
    fields: &[(&str, FieldValue<'_>)],
) -> Result<String, GhError> {
    let args = build_api_args(method, endpoint, fields);
    let args_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
    gh_command(&args_refs).await
}

/// Execute gh api with method and fields, decoding the JSON response
pub async fn gh_api_json(
    method: Method,
    endpoint: &str,
    fields: &[(&str, FieldValue<'_>)],
) -> Result<serde_json::Value, GhError> {
    let output = gh_api_send(method, endpoint, fields).await?;
    Ok(serde_json::from_str(&output)?)
}
