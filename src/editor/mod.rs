use anyhow::Result;
use std::env;
use std::fs;
use std::process::Command;
use tempfile::NamedTempFile;

/// Marker prefix for template header lines
const MARKER: &str = "<!--";
/// Number of marker lines `scratch_template` writes
const HEADER_LINES: usize = 2;

/// Resolve editor command and split into program + arguments.
///
/// Resolution order (same as git):
///   1. Explicit config value (`configured`)
///   2. `$VISUAL`
///   3. `$EDITOR`
///   4. `"vi"` (fallback)
///
/// Supports quoted arguments (e.g. `emacsclient -c -a ""`) via `shell_words::split`.
fn resolve_and_split_editor(configured: Option<&str>) -> Result<(String, Vec<String>)> {
    let raw = configured
        .filter(|s| !s.trim().is_empty())
        .map(String::from)
        .or_else(|| env::var("VISUAL").ok().filter(|s| !s.trim().is_empty()))
        .or_else(|| env::var("EDITOR").ok().filter(|s| !s.trim().is_empty()))
        .unwrap_or_else(|| "vi".to_string());

    let mut parts = shell_words::split(&raw)?.into_iter();
    let cmd = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("empty editor command"))?;
    Ok((cmd, parts.collect()))
}

/// Run a `Command`, converting `NotFound` into a user-friendly error message.
fn run_editor_command(cmd: &str, mut command: Command) -> Result<std::process::ExitStatus> {
    command.status().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!(
                "Editor '{}' not found. Set $VISUAL or $EDITOR environment variable, \
                 or set 'editor' in ~/.config/prsign/config.toml",
                cmd
            )
        } else {
            anyhow::anyhow!("Failed to launch editor '{}': {}", cmd, e)
        }
    })
}

/// Template written to the scratch file before the editor opens
fn scratch_template(title: &str, initial_text: &str) -> String {
    let header = format!(
        "{m} prsign: {} -->\n\
         {m} Save and close to submit, delete all content to cancel -->",
        title,
        m = MARKER
    );
    if initial_text.is_empty() {
        format!("{}\n\n", header)
    } else {
        format!("{}\n\n{}\n", header, initial_text)
    }
}

/// Strip the template header and the blank line after it. Only the leading
/// header is removed, so HTML comments written in the body are kept.
fn extract_body(content: &str) -> String {
    let mut lines = content.lines().peekable();
    let mut header = 0;
    while header < HEADER_LINES
        && lines
            .next_if(|line| line.trim_start().starts_with(MARKER))
            .is_some()
    {
        header += 1;
    }
    if header > 0 {
        lines.next_if(|line| line.trim().is_empty());
    }
    lines.collect::<Vec<_>>().join("\n")
}

/// Open the scratch region: an external editor on a temp file.
///
/// Returns `None` when the editor exits non-zero or leaves no text, which
/// callers treat as cancel. The caller suspends/restores the terminal.
pub fn open_scratch_editor(
    editor: Option<&str>,
    title: &str,
    initial_text: &str,
) -> Result<Option<String>> {
    let temp_file: NamedTempFile = tempfile::Builder::new().suffix(".md").tempfile()?;
    fs::write(temp_file.path(), scratch_template(title, initial_text))?;

    let (cmd, args) = resolve_and_split_editor(editor)?;
    let mut command = Command::new(&cmd);
    command.args(&args).arg(temp_file.path());
    let status = run_editor_command(&cmd, command)?;

    if !status.success() {
        return Ok(None);
    }

    let body = extract_body(&fs::read_to_string(temp_file.path())?);
    if body.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(body))
    }
}
