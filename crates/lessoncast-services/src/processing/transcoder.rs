//! The external step that turns a raw upload into an HLS rendition.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use lessoncast_storage::keys::MANIFEST_FILE;

/// Playlist names looked for in the output directory, in order.
const MANIFEST_CANDIDATES: [&str; 2] = [MANIFEST_FILE, "master.m3u8"];
const MAX_REASON_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOutput {
    /// Playlist path relative to the output directory. `None` publishes the raw
    /// upload progressively.
    pub manifest_path: Option<PathBuf>,
    /// Duration measured by the transcoder; overrides the client's probe.
    pub duration_seconds: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("{0}")]
    Failed(String),

    #[error("Transcoder produced no playlist")]
    MissingManifest,

    #[error("Transcoder IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Whether the raw upload must be downloaded to `input` before [`Transcoder::transcode`].
    fn needs_input(&self) -> bool {
        true
    }

    /// Writes the rendition under `output_dir`.
    async fn transcode(
        &self,
        input: &Path,
        output_dir: &Path,
    ) -> Result<TranscodeOutput, TranscodeError>;
}

/// Publishes the raw upload as-is; players receive a presigned URL of the object.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTranscoder;

#[async_trait]
impl Transcoder for PassthroughTranscoder {
    fn needs_input(&self) -> bool {
        false
    }

    async fn transcode(
        &self,
        _input: &Path,
        _output_dir: &Path,
    ) -> Result<TranscodeOutput, TranscodeError> {
        Ok(TranscodeOutput {
            manifest_path: None,
            duration_seconds: None,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandReport {
    duration_seconds: Option<f64>,
}

/// Runs `<program> [args..] <input> <output_dir>`.
///
/// The program must leave `index.m3u8` (or `master.m3u8`) in the output
/// directory and may print `{"durationSeconds": 61.4}` on stdout. A non-zero
/// exit fails the job with the last line of stderr as the reason.
#[derive(Debug, Clone)]
pub struct CommandTranscoder {
    program: String,
    args: Vec<String>,
}

impl CommandTranscoder {
    pub fn new(command: &str) -> anyhow::Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("Transcoder command is empty"))?;
        validate_path(Path::new(&program))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Transcoder for CommandTranscoder {
    #[tracing::instrument(
        skip(self),
        fields(process.executable.name = %self.program, input = %input.display())
    )]
    async fn transcode(
        &self,
        input: &Path,
        output_dir: &Path,
    ) -> Result<TranscodeOutput, TranscodeError> {
        validate_path(input).map_err(|e| TranscodeError::Failed(e.to_string()))?;
        validate_path(output_dir).map_err(|e| TranscodeError::Failed(e.to_string()))?;

        let start = std::time::Instant::now();
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(input)
            .arg(output_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .map(|line| truncate(line.trim()))
                .unwrap_or_else(|| format!("Transcoder exited with {}", output.status));
            tracing::warn!(
                exit_status = %output.status,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                reason = %reason,
                "Transcoder failed"
            );
            return Err(TranscodeError::Failed(reason));
        }

        let manifest_path = MANIFEST_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|name| output_dir.join(name).is_file())
            .ok_or(TranscodeError::MissingManifest)?;

        let duration_seconds = serde_json::from_slice::<CommandReport>(&output.stdout)
            .ok()
            .and_then(|report| report.duration_seconds)
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.round() as u32);

        tracing::info!(
            manifest = %manifest_path.display(),
            duration_seconds = ?duration_seconds,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Transcoder finished"
        );

        Ok(TranscodeOutput {
            manifest_path: Some(manifest_path),
            duration_seconds,
        })
    }
}

fn truncate(line: &str) -> String {
    if line.len() <= MAX_REASON_LEN {
        return line.to_string();
    }
    let mut end = MAX_REASON_LEN;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &line[..end])
}

/// Reject paths that could smuggle shell syntax into a command line.
fn validate_path(path: &Path) -> anyhow::Result<()> {
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Path contains invalid UTF-8"))?;

    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path_str.chars().any(|c| dangerous_chars.contains(&c)) {
        anyhow::bail!("Path contains potentially dangerous characters: {}", path_str);
    }
    if path_str.contains("..") {
        anyhow::bail!("Path contains directory traversal sequence: {}", path_str);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        let transcoder = CommandTranscoder::new("/usr/local/bin/hls-encode --preset fast").unwrap();
        assert_eq!(transcoder.program(), "/usr/local/bin/hls-encode");
        assert_eq!(transcoder.args, vec!["--preset", "fast"]);

        assert!(CommandTranscoder::new("   ").is_err());
        assert!(CommandTranscoder::new("encode;rm").is_err());
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path(Path::new("/tmp/job/input.mp4")).is_ok());
        assert!(validate_path(Path::new("/tmp/../etc/passwd")).is_err());
        assert!(validate_path(Path::new("/tmp/$(whoami)")).is_err());
    }

    #[test]
    fn test_truncate_long_reason() {
        let long = "é".repeat(400);
        let reason = truncate(&long);
        assert!(reason.ends_with("..."));
        assert!(reason.len() <= MAX_REASON_LEN + 3);
    }

    #[tokio::test]
    async fn test_passthrough_publishes_raw() {
        let output = PassthroughTranscoder
            .transcode(Path::new("in"), Path::new("out"))
            .await
            .unwrap();
        assert!(output.manifest_path.is_none());
        assert!(!PassthroughTranscoder.needs_input());
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("encode.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_success_reports_manifest_and_duration() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            "printf '#EXTM3U\\n' > \"$2/index.m3u8\"\necho '{\"durationSeconds\": 61.4}'",
        );
        let out_dir = dir.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();

        let transcoder = CommandTranscoder::new(script.to_str().unwrap()).unwrap();
        let output = transcoder
            .transcode(&dir.path().join("input.mp4"), &out_dir)
            .await
            .unwrap();

        assert_eq!(output.manifest_path, Some(PathBuf::from("index.m3u8")));
        assert_eq!(output.duration_seconds, Some(61));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_failure_uses_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "echo 'Unsupported codec: prores' >&2\nexit 3");
        let transcoder = CommandTranscoder::new(script.to_str().unwrap()).unwrap();

        let err = transcoder
            .transcode(&dir.path().join("input.mp4"), dir.path())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported codec: prores");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_without_playlist_fails() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "exit 0");
        let out_dir = dir.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();

        let transcoder = CommandTranscoder::new(script.to_str().unwrap()).unwrap();
        let err = transcoder
            .transcode(&dir.path().join("input.mp4"), &out_dir)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::MissingManifest));
    }
}
