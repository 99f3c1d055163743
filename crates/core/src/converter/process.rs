//! Running external tools.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use super::error::ConverterError;

/// Longest stderr excerpt kept on a failure.
const STDERR_TAIL_BYTES: usize = 2000;

/// Runs `program` with `args`, failing on spawn error, non-zero exit, or
/// when `timeout_secs` elapses. The child is killed if the timeout fires.
pub async fn run_tool<I, S>(
    program: &Path,
    args: I,
    working_dir: Option<&Path>,
    timeout_secs: u64,
) -> Result<String, ConverterError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let tool = tool_name(program);
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    tracing::debug!(tool = %tool, ?args, "Running external tool");

    let mut command = Command::new(program);
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    let child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConverterError::ToolNotFound { tool: tool.clone() }
        } else {
            ConverterError::Io(e)
        }
    })?;

    let output = match timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await
    {
        Ok(result) => result?,
        Err(_) => {
            return Err(ConverterError::Timeout {
                tool,
                timeout_secs,
            })
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr_tail(&stderr);
        return Err(ConverterError::tool_failed(
            tool,
            output.status.code(),
            if stderr.is_empty() { None } else { Some(stderr) },
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Returns true if `program args...` runs and exits successfully.
/// Never fails: any problem means the tool is treated as absent.
pub async fn tool_responds(program: &Path, args: &[&str]) -> bool {
    let result = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    match timeout(Duration::from_secs(15), result).await {
        Ok(Ok(status)) => status.success(),
        _ => false,
    }
}

fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_tool_is_not_found() {
        let err = run_tool(
            Path::new("/nonexistent/transmute-tool"),
            ["-version"],
            None,
            5,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConverterError::ToolNotFound { ref tool } if tool == "transmute-tool"));
    }

    #[tokio::test]
    async fn test_missing_tool_does_not_respond() {
        assert!(!tool_responds(Path::new("/nonexistent/transmute-tool"), &["--version"]).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_tool_reports_exit_code() {
        let err = run_tool(Path::new("sh"), ["-c", "echo boom >&2; exit 3"], None, 5)
            .await
            .unwrap_err();
        match err {
            ConverterError::ToolFailed { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr.as_deref(), Some("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_tool_times_out() {
        let err = run_tool(Path::new("sh"), ["-c", "sleep 5"], None, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ConverterError::Timeout { timeout_secs: 1, .. }));
    }

    #[test]
    fn test_stderr_tail_keeps_end() {
        let long = "x".repeat(STDERR_TAIL_BYTES + 10) + "END";
        let tail = stderr_tail(&long);
        assert!(tail.ends_with("END"));
        assert_eq!(tail.len(), STDERR_TAIL_BYTES);
    }
}
