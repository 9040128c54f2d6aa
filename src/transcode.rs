//! Audio transcoding — streaming contract plus the bundled ffmpeg adapter.
//!
//! The transcoder consumes the encoded stream incrementally and writes the
//! target-format bytes into a caller-supplied sink. Errors are only final
//! after EOF: a nonzero ffmpeg exit fails the attempt before any rename can
//! make a broken file visible.

use crate::config::TranscodeConfig;
use crate::error::TranscodeError;
use crate::source::EncodedAudio;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Streaming input/output transcoding contract.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Consume `input` to EOF and write the transcoded bytes into `output`.
    ///
    /// On error the sink's contents are unspecified; callers must discard the
    /// partial output.
    async fn transcode(
        &self,
        input: EncodedAudio,
        output: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> std::result::Result<(), TranscodeError>;
}

/// External ffmpeg process invoked in stdin→stdout streaming mode.
///
/// Encodes to MP3 with libmp3lame: best-quality VBR (`-qscale:a 0`) by
/// default, or a configured constant bitrate.
pub struct FfmpegTranscoder {
    binary: PathBuf,
    bitrate_kbps: Option<u32>,
}

impl FfmpegTranscoder {
    /// Create a transcoder using an explicit ffmpeg binary path.
    pub fn new(binary: PathBuf, bitrate_kbps: Option<u32>) -> Self {
        Self {
            binary,
            bitrate_kbps,
        }
    }

    /// Discover the ffmpeg binary in the system PATH.
    ///
    /// Uses the `which` crate; returns None when no `ffmpeg` is found.
    pub fn from_path(bitrate_kbps: Option<u32>) -> Option<Self> {
        which::which("ffmpeg")
            .ok()
            .map(|binary| Self::new(binary, bitrate_kbps))
    }

    /// Build a transcoder from configuration: explicit path first, then PATH
    /// search if enabled.
    pub fn from_config(config: &TranscodeConfig) -> std::result::Result<Self, TranscodeError> {
        if let Some(path) = &config.ffmpeg_path {
            return Ok(Self::new(path.clone(), config.bitrate_kbps));
        }
        if config.search_path {
            return Self::from_path(config.bitrate_kbps).ok_or_else(|| {
                TranscodeError::BinaryNotFound("ffmpeg not found in PATH".to_string())
            });
        }
        Err(TranscodeError::BinaryNotFound(
            "no ffmpeg_path configured and PATH search is disabled".to_string(),
        ))
    }

    fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            "pipe:0".to_string(),
            "-codec:a".to_string(),
            "libmp3lame".to_string(),
        ];
        match self.bitrate_kbps {
            Some(kbps) => {
                args.push("-b:a".to_string());
                args.push(format!("{kbps}k"));
            }
            None => {
                args.push("-qscale:a".to_string());
                args.push("0".to_string());
            }
        }
        args.push("-f".to_string());
        args.push("mp3".to_string());
        args.push("pipe:1".to_string());
        args
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        mut input: EncodedAudio,
        output: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> std::result::Result<(), TranscodeError> {
        let args = self.build_args();
        tracing::debug!(binary = %self.binary.display(), ?args, "Spawning ffmpeg");

        let mut child = tokio::process::Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            TranscodeError::Io(std::io::Error::other("ffmpeg stdin not captured"))
        })?;
        let mut stdout = child.stdout.take().ok_or_else(|| {
            TranscodeError::Io(std::io::Error::other("ffmpeg stdout not captured"))
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            TranscodeError::Io(std::io::Error::other("ffmpeg stderr not captured"))
        })?;

        // Feed the encoded stream concurrently with draining stdout, otherwise
        // a full pipe buffer deadlocks both processes. Read errors from the
        // input are the caller's problem and must not be mistaken for a clean
        // EOF; write errors usually mean ffmpeg rejected the input and exited,
        // which the status check below reports.
        let feeder = tokio::spawn(async move {
            let mut buf = [0u8; 16 * 1024];
            loop {
                let n = match input.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => return Err(e),
                };
                if let Err(e) = stdin.write_all(&buf[..n]).await {
                    tracing::debug!(error = %e, "ffmpeg stdin write ended early");
                    break;
                }
            }
            // Dropping stdin closes the pipe and signals EOF
            Ok(())
        });

        let stderr_reader = tokio::spawn(async move {
            let mut buf = String::new();
            stderr.read_to_string(&mut buf).await.ok();
            buf
        });

        let copy_result = tokio::io::copy(&mut stdout, output).await;

        let feed_result = feeder
            .await
            .unwrap_or_else(|e| Err(std::io::Error::other(e)));
        let stderr_output = stderr_reader.await.unwrap_or_default();
        let status = child.wait().await?;

        if !status.success() {
            return Err(TranscodeError::ProcessFailed {
                status: status.to_string(),
                stderr: stderr_output.trim().to_string(),
            });
        }

        // ffmpeg exits cleanly when its stdin just stops, so a stream that
        // died mid-transfer would otherwise be placed as a truncated file
        if let Err(e) = feed_result {
            return Err(TranscodeError::Input(e));
        }

        let bytes_out = copy_result?;
        tracing::debug!(bytes_out, "ffmpeg transcode complete");
        Ok(())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_args_request_best_quality_vbr() {
        let transcoder = FfmpegTranscoder::new(PathBuf::from("/usr/bin/ffmpeg"), None);
        let args = transcoder.build_args();
        assert!(args.windows(2).any(|w| w == ["-qscale:a", "0"]));
        assert!(!args.iter().any(|a| a == "-b:a"));
    }

    #[test]
    fn configured_bitrate_switches_to_cbr() {
        let transcoder = FfmpegTranscoder::new(PathBuf::from("/usr/bin/ffmpeg"), Some(192));
        let args = transcoder.build_args();
        assert!(args.windows(2).any(|w| w == ["-b:a", "192k"]));
        assert!(!args.iter().any(|a| a == "-qscale:a"));
    }

    #[test]
    fn args_stream_stdin_to_stdout() {
        let transcoder = FfmpegTranscoder::new(PathBuf::from("ffmpeg"), None);
        let args = transcoder.build_args();
        assert!(args.windows(2).any(|w| w == ["-i", "pipe:0"]));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
        assert!(args.windows(2).any(|w| w == ["-f", "mp3"]));
    }

    #[test]
    fn from_config_prefers_explicit_path() {
        let config = TranscodeConfig {
            ffmpeg_path: Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg")),
            search_path: true,
            bitrate_kbps: None,
        };
        let transcoder = FfmpegTranscoder::from_config(&config).unwrap();
        assert_eq!(transcoder.binary, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
    }

    #[test]
    fn from_config_without_path_or_search_fails() {
        let config = TranscodeConfig {
            ffmpeg_path: None,
            search_path: false,
            bitrate_kbps: None,
        };
        // map to () so unwrap_err has a Debug-printable Ok side
        let err = FfmpegTranscoder::from_config(&config).map(|_| ()).unwrap_err();
        assert!(matches!(err, TranscodeError::BinaryNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn input_stream_failure_fails_the_attempt_even_on_clean_exit() {
        use std::os::unix::fs::PermissionsExt;
        use std::pin::Pin;
        use std::task::{Context, Poll};
        use tokio::io::{AsyncRead, ReadBuf};

        /// Yields one chunk, then dies like a dropped connection
        struct DroppedStream {
            sent: bool,
        }

        impl AsyncRead for DroppedStream {
            fn poll_read(
                mut self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
                buf: &mut ReadBuf<'_>,
            ) -> Poll<std::io::Result<()>> {
                if self.sent {
                    Poll::Ready(Err(std::io::ErrorKind::ConnectionReset.into()))
                } else {
                    self.sent = true;
                    buf.put_slice(b"first chunk of encoded audio");
                    Poll::Ready(Ok(()))
                }
            }
        }

        // Stand-in encoder that drains stdin, emits output, and exits 0
        // regardless of how much input it saw
        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("fake-encoder");
        std::fs::write(
            &script,
            "#!/bin/sh\ncat > /dev/null\nprintf 'ENCODED'\nexit 0\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let transcoder = FfmpegTranscoder::new(script, None);
        let input: EncodedAudio = Box::pin(DroppedStream { sent: false });
        let mut sink = Vec::new();
        let err = transcoder.transcode(input, &mut sink).await.unwrap_err();
        assert!(
            matches!(
                err,
                TranscodeError::Input(ref e) if e.kind() == std::io::ErrorKind::ConnectionReset
            ),
            "a dead input stream must fail the attempt, got: {err}"
        );
    }

    #[tokio::test]
    async fn missing_binary_surfaces_as_io_error() {
        let transcoder =
            FfmpegTranscoder::new(PathBuf::from("/nonexistent/ffmpeg-binary-xyz"), None);
        let input: EncodedAudio = Box::pin(std::io::Cursor::new(b"data".to_vec()));
        let mut sink = Vec::new();
        let err = transcoder.transcode(input, &mut sink).await.unwrap_err();
        assert!(matches!(err, TranscodeError::Io(_)));
    }
}
