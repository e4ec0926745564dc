//! Local duration probing. No network access.
//!
//! MP4 and QuickTime files are read directly: the `mvhd` box inside `moov`
//! carries a timescale and a duration. Anything else goes through `ffprobe`.

use async_trait::async_trait;
use serde::Deserialize;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported container: {0}")]
    Unsupported(String),

    #[error("Malformed media file: {0}")]
    Malformed(String),

    #[error("ffprobe failed: {0}")]
    Command(String),
}

/// Reads a media file's duration in whole seconds.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<u32, ProbeError>;
}

fn round_seconds(seconds: f64) -> Result<u32, ProbeError> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ProbeError::Malformed(format!("Invalid duration {}", seconds)));
    }
    Ok(seconds.round().min(u32::MAX as f64) as u32)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Mp4DurationProbe;

struct BoxHeader {
    kind: [u8; 4],
    start: u64,
    /// `None` when the box runs to the end of the file.
    end: Option<u64>,
    header_len: u64,
}

fn box_end(start: u64, size: u64) -> Result<u64, ProbeError> {
    start
        .checked_add(size)
        .ok_or_else(|| ProbeError::Malformed("Box size overflows the file offset".into()))
}

async fn read_box_header<R>(reader: &mut R) -> Result<Option<BoxHeader>, ProbeError>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    let start = reader.stream_position().await?;
    let mut head = [0u8; 8];
    match reader.read_exact(&mut head).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let size = u32::from_be_bytes([head[0], head[1], head[2], head[3]]) as u64;
    let kind = [head[4], head[5], head[6], head[7]];

    let (end, header_len) = match size {
        0 => (None, 8),
        1 => {
            let large = reader.read_u64().await?;
            if large < 16 {
                return Err(ProbeError::Malformed("Box size smaller than its header".into()));
            }
            (Some(box_end(start, large)?), 16)
        }
        n if n < 8 => {
            return Err(ProbeError::Malformed("Box size smaller than its header".into()));
        }
        n => (Some(box_end(start, n)?), 8),
    };

    Ok(Some(BoxHeader {
        kind,
        start,
        end,
        header_len,
    }))
}

/// Finds the first box of `kind` among siblings between the current position and `limit`.
async fn find_box<R>(
    reader: &mut R,
    kind: &[u8; 4],
    limit: Option<u64>,
) -> Result<Option<BoxHeader>, ProbeError>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    loop {
        if let Some(limit) = limit {
            if reader.stream_position().await? >= limit {
                return Ok(None);
            }
        }
        let Some(header) = read_box_header(reader).await? else {
            return Ok(None);
        };
        if &header.kind == kind {
            return Ok(Some(header));
        }
        match header.end {
            Some(end) => {
                reader.seek(SeekFrom::Start(end)).await?;
            }
            None => return Ok(None),
        }
    }
}

impl Mp4DurationProbe {
    /// Duration from any seekable MP4 byte source.
    pub async fn probe_reader<R>(&self, reader: &mut R) -> Result<u32, ProbeError>
    where
        R: AsyncRead + AsyncSeek + Unpin,
    {
        let moov = find_box(reader, b"moov", None)
            .await?
            .ok_or_else(|| ProbeError::Malformed("No moov box".into()))?;
        reader
            .seek(SeekFrom::Start(moov.start + moov.header_len))
            .await?;
        find_box(reader, b"mvhd", moov.end)
            .await?
            .ok_or_else(|| ProbeError::Malformed("No mvhd box".into()))?;

        let version = reader.read_u8().await?;
        let mut flags = [0u8; 3];
        reader.read_exact(&mut flags).await?;

        let (timescale, duration) = if version == 1 {
            reader.seek(SeekFrom::Current(16)).await?;
            let timescale = reader.read_u32().await?;
            let duration = reader.read_u64().await?;
            (timescale, (duration != u64::MAX).then_some(duration))
        } else {
            reader.seek(SeekFrom::Current(8)).await?;
            let timescale = reader.read_u32().await?;
            let duration = reader.read_u32().await?;
            (timescale, (duration != u32::MAX).then_some(duration as u64))
        };

        if timescale == 0 {
            return Err(ProbeError::Malformed("mvhd timescale is zero".into()));
        }
        let duration =
            duration.ok_or_else(|| ProbeError::Malformed("Duration is not recorded".into()))?;
        round_seconds(duration as f64 / timescale as f64)
    }
}

#[async_trait]
impl DurationProbe for Mp4DurationProbe {
    async fn probe(&self, path: &Path) -> Result<u32, ProbeError> {
        let mut file = File::open(path).await?;
        self.probe_reader(&mut file).await
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Shells out to `ffprobe` for containers the MP4 reader does not handle.
#[derive(Debug, Clone)]
pub struct FfprobeDurationProbe {
    program: PathBuf,
}

impl Default for FfprobeDurationProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl FfprobeDurationProbe {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl DurationProbe for FfprobeDurationProbe {
    async fn probe(&self, path: &Path) -> Result<u32, ProbeError> {
        let output = Command::new(&self.program)
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProbeError::Command(format!("{}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::Command(stderr.trim().to_string()));
        }

        let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| ProbeError::Command(format!("Unreadable ffprobe output: {}", e)))?;
        let seconds = parsed
            .format
            .duration
            .as_deref()
            .and_then(|d| d.trim().parse::<f64>().ok())
            .ok_or_else(|| ProbeError::Unsupported("ffprobe reported no duration".into()))?;
        round_seconds(seconds)
    }
}

/// MP4 reader for `.mp4`/`.m4v`/`.mov`, falling back to ffprobe.
#[derive(Debug, Clone, Default)]
pub struct ContainerDurationProbe {
    mp4: Mp4DurationProbe,
    ffprobe: FfprobeDurationProbe,
}

impl ContainerDurationProbe {
    pub fn new(ffprobe: FfprobeDurationProbe) -> Self {
        Self {
            mp4: Mp4DurationProbe,
            ffprobe,
        }
    }
}

fn is_iso_media(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "mp4" | "m4v" | "mov"))
        .unwrap_or(false)
}

#[async_trait]
impl DurationProbe for ContainerDurationProbe {
    async fn probe(&self, path: &Path) -> Result<u32, ProbeError> {
        if is_iso_media(path) {
            match self.mp4.probe(path).await {
                Ok(seconds) => return Ok(seconds),
                Err(ProbeError::Io(e)) => return Err(ProbeError::Io(e)),
                Err(e) => {
                    tracing::debug!(error = %e, path = %path.display(), "MP4 header unreadable, trying ffprobe");
                }
            }
        }
        self.ffprobe.probe(path).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    fn mp4_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(payload);
        out
    }

    fn mvhd_v0(timescale: u32, duration: u32) -> Vec<u8> {
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&[0u8; 8]);
        payload.extend_from_slice(&timescale.to_be_bytes());
        payload.extend_from_slice(&duration.to_be_bytes());
        payload.extend_from_slice(&[0u8; 80]);
        mp4_box(b"mvhd", &payload)
    }

    fn mvhd_v1(timescale: u32, duration: u64) -> Vec<u8> {
        let mut payload = vec![1u8, 0, 0, 0];
        payload.extend_from_slice(&[0u8; 16]);
        payload.extend_from_slice(&timescale.to_be_bytes());
        payload.extend_from_slice(&duration.to_be_bytes());
        payload.extend_from_slice(&[0u8; 80]);
        mp4_box(b"mvhd", &payload)
    }

    /// `ftyp`, a media payload, then `moov` holding `mvhd` after another child.
    pub(crate) fn sample_mp4(timescale: u32, duration: u32) -> Vec<u8> {
        let mut moov_payload = mp4_box(b"udta", b"meta");
        moov_payload.extend(mvhd_v0(timescale, duration));
        let mut file = mp4_box(b"ftyp", b"isom\0\0\x02\0isomiso2mp41");
        file.extend(mp4_box(b"mdat", &[0x42; 4096]));
        file.extend(mp4_box(b"moov", &moov_payload));
        file
    }

    #[tokio::test]
    async fn test_mvhd_v0_rounds_to_whole_seconds() {
        let data = sample_mp4(1000, 125_400);
        let seconds = Mp4DurationProbe
            .probe_reader(&mut Cursor::new(data))
            .await
            .unwrap();
        assert_eq!(seconds, 125);

        let data = sample_mp4(600, 600 * 10 + 300);
        assert_eq!(
            Mp4DurationProbe.probe_reader(&mut Cursor::new(data)).await.unwrap(),
            11
        );
    }

    #[tokio::test]
    async fn test_mvhd_v1_after_large_mdat() {
        let mut data = mp4_box(b"ftyp", b"qt  ");
        // 64-bit size header
        let payload = [0u8; 32];
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(b"mdat");
        data.extend_from_slice(&((payload.len() + 16) as u64).to_be_bytes());
        data.extend_from_slice(&payload);
        data.extend(mp4_box(b"moov", &mvhd_v1(90_000, 90_000 * 3600)));

        let seconds = Mp4DurationProbe
            .probe_reader(&mut Cursor::new(data))
            .await
            .unwrap();
        assert_eq!(seconds, 3600);
    }

    #[tokio::test]
    async fn test_missing_moov() {
        let data = mp4_box(b"ftyp", b"isom");
        let err = Mp4DurationProbe
            .probe_reader(&mut Cursor::new(data))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_oversized_large_box_is_malformed() {
        let mut bytes = mp4_box(b"ftyp", b"isom");
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(b"free");
        bytes.extend_from_slice(&(u64::MAX - 7).to_be_bytes());

        let err = Mp4DurationProbe
            .probe_reader(&mut Cursor::new(bytes))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_zero_timescale_rejected() {
        let data = sample_mp4(0, 10);
        assert!(Mp4DurationProbe
            .probe_reader(&mut Cursor::new(data))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_probe_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lesson.mp4");
        tokio::fs::write(&path, sample_mp4(1000, 42_000)).await.unwrap();

        let probe = ContainerDurationProbe::new(FfprobeDurationProbe::new("/nonexistent/ffprobe"));
        assert_eq!(probe.probe(&path).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_missing_ffprobe_is_command_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lesson.webm");
        tokio::fs::write(&path, b"\x1a\x45\xdf\xa3").await.unwrap();

        let probe = ContainerDurationProbe::new(FfprobeDurationProbe::new("/nonexistent/ffprobe"));
        assert!(matches!(
            probe.probe(&path).await,
            Err(ProbeError::Command(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ffprobe_json_output() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-ffprobe");
        std::fs::write(
            &script,
            "#!/bin/sh\necho '{\"format\": {\"duration\": \"125.400000\"}}'\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let video = dir.path().join("lesson.mkv");
        std::fs::write(&video, b"matroska").unwrap();

        let seconds = FfprobeDurationProbe::new(&script).probe(&video).await.unwrap();
        assert_eq!(seconds, 125);
    }
}
