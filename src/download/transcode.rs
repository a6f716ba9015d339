//! Transcode fallback: pull audio straight from a remote media URL.
//!
//! Used when the resolved URL is not a directly saveable audio file. The
//! external tool reads the URL itself, so there is no intermediate download.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use super::client::{file_size, remove_partial};
use super::error::DownloadError;

/// Binary name looked up on `PATH`.
pub const FFMPEG_BINARY: &str = "ffmpeg";

/// Produces a local audio file from a remote media URL.
#[async_trait]
pub trait Transcoder: Send + Sync + fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Writes `target` from `source_url`.
    ///
    /// Success means the tool reported success and `target` exists with a
    /// non-zero size.
    async fn transcode(&self, source_url: &str, target: &Path) -> Result<(), DownloadError>;
}

/// `ffmpeg` subprocess producing 32 kbps, 44.1 kHz MP3.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl FfmpegTranscoder {
    /// Creates a transcoder running `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Finds `ffmpeg` on `PATH`.
    #[must_use]
    pub fn from_path() -> Option<Self> {
        which::which(FFMPEG_BINARY).ok().map(Self::new)
    }

    /// Uses `configured` if given, else `PATH`, else the bare binary name.
    #[must_use]
    pub fn locate(configured: Option<&Path>) -> Self {
        if let Some(program) = configured {
            return Self::new(program);
        }
        Self::from_path().unwrap_or_else(|| {
            warn!(
                binary = FFMPEG_BINARY,
                "transcoder not found on PATH; audio fallback downloads will fail"
            );
            Self::new(FFMPEG_BINARY)
        })
    }

    /// Program that will be executed.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command-line arguments for one transcode.
    #[must_use]
    pub fn args(source_url: &str, target: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-y",
            "-i",
            source_url,
            "-vn",
            "-acodec",
            "libmp3lame",
            "-ar",
            "44100",
            "-ab",
            "32k",
            "-f",
            "mp3",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(target.as_os_str().to_os_string());
        args
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    #[instrument(skip(self), fields(program = %self.program.display(), path = %target.display()))]
    async fn transcode(&self, source_url: &str, target: &Path) -> Result<(), DownloadError> {
        debug!("starting transcode");

        let output = Command::new(&self.program)
            .args(Self::args(source_url, target))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                DownloadError::transcoder_unavailable(self.program.display().to_string(), e)
            })?;

        if !output.status.success() {
            remove_partial(target).await;
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::transcode(
                target,
                output.status.code(),
                &stderr,
            ));
        }

        if file_size(target).await == 0 {
            remove_partial(target).await;
            return Err(DownloadError::empty_output(target));
        }

        debug!("transcode complete");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_args_fixed_output_parameters() {
        let args = FfmpegTranscoder::args("https://x/v.mp4", Path::new("/t/out.mp3"));
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "-y",
                "-i",
                "https://x/v.mp4",
                "-vn",
                "-acodec",
                "libmp3lame",
                "-ar",
                "44100",
                "-ab",
                "32k",
                "-f",
                "mp3",
                "/t/out.mp3"
            ]
        );
    }

    #[test]
    fn test_locate_prefers_configured_path() {
        let transcoder = FfmpegTranscoder::locate(Some(Path::new("/opt/ffmpeg/bin/ffmpeg")));
        assert_eq!(transcoder.program(), Path::new("/opt/ffmpeg/bin/ffmpeg"));
    }

    #[test]
    fn test_from_path_consistent_with_which() {
        assert_eq!(
            which::which(FFMPEG_BINARY).is_ok(),
            FfmpegTranscoder::from_path().is_some()
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let transcoder = FfmpegTranscoder::new(temp.path().join("no-such-ffmpeg"));
        let err = transcoder
            .transcode("https://x/v.mp4", &temp.path().join("a.mp3"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, DownloadError::TranscoderUnavailable { .. }),
            "got {err:?}"
        );
    }

    #[cfg(unix)]
    fn fake_tool(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_tool_run_writes_target() {
        let temp = TempDir::new().unwrap();
        let tool = fake_tool(temp.path(), r#"for last; do :; done; printf 'mp3' > "$last""#);
        let target = temp.path().join("a.mp3");
        FfmpegTranscoder::new(tool)
            .transcode("https://x/v.mp4", &target)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"mp3");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_keeps_stderr() {
        let temp = TempDir::new().unwrap();
        let tool = fake_tool(temp.path(), "echo 'Server returned 403 Forbidden' >&2; exit 3");
        let err = FfmpegTranscoder::new(tool)
            .transcode("https://x/v.mp4", &temp.path().join("a.mp3"))
            .await
            .unwrap_err();
        match err {
            DownloadError::Transcode { status, stderr, .. } => {
                assert_eq!(status, Some(3));
                assert!(stderr.contains("403 Forbidden"), "{stderr}");
            }
            other => panic!("expected Transcode, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_without_output_is_empty() {
        let temp = TempDir::new().unwrap();
        let tool = fake_tool(temp.path(), r#"for last; do :; done; : > "$last""#);
        let target = temp.path().join("a.mp3");
        let err = FfmpegTranscoder::new(tool)
            .transcode("https://x/v.mp4", &target)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::EmptyOutput { .. }), "got {err:?}");
        assert!(!target.exists());
    }
}
