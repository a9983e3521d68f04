//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use reelcycle_models::EncodingConfig;

use crate::error::{MediaError, MediaResult};
use crate::progress::FfmpegProgress;

/// Stderr lines kept for failure diagnostics.
const MAX_DIAGNOSTIC_LINES: usize = 200;

/// One `-i` input with the options that precede it.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInput {
    /// Input arguments (before -i)
    pub args: Vec<String>,
    /// File path, or a lavfi source description when `args` contain `-f lavfi`
    pub source: String,
}

impl FfmpegInput {
    /// Plain file input.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            args: Vec::new(),
            source: path.as_ref().to_string_lossy().into_owned(),
        }
    }

    /// Still image repeated forever (`-loop 1`).
    pub fn looped_image(path: impl AsRef<Path>) -> Self {
        Self::file(path).arg("-loop").arg("1")
    }

    /// Generated source via the lavfi pseudo-demuxer.
    pub fn lavfi(description: impl Into<String>) -> Self {
        Self {
            args: vec!["-f".to_string(), "lavfi".to_string()],
            source: description.into(),
        }
    }

    /// Add an input option.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Seek into the input before decoding.
    pub fn seek(self, seconds: f64) -> Self {
        self.arg("-ss").arg(format!("{:.3}", seconds))
    }

    /// Seek relative to the end of the input.
    pub fn seek_from_end(self, seconds: f64) -> Self {
        self.arg("-sseof").arg(format!("{:.3}", -seconds.abs()))
    }

    /// Limit how much of the input is read.
    pub fn duration(self, seconds: f64) -> Self {
        self.arg("-t").arg(format!("{:.3}", seconds))
    }
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in `-i` order; filter pins refer to them by index
    inputs: Vec<FfmpegInput>,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after the inputs)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Append an input.
    pub fn input(mut self, input: FfmpegInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Append several inputs.
    pub fn inputs<I>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = FfmpegInput>,
    {
        self.inputs.extend(inputs);
        self
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream or labeled pin to the output. Labels are wrapped in brackets.
    pub fn map(self, pin: impl AsRef<str>) -> Self {
        let pin = pin.as_ref();
        let spec = if pin.starts_with('[') || pin.contains(':') {
            pin.to_string()
        } else {
            format!("[{}]", pin)
        };
        self.output_arg("-map").output_arg(spec)
    }

    /// Apply the shared encoding settings.
    pub fn encoding(self, encoding: &EncodingConfig) -> Self {
        self.output_args(encoding.to_ffmpeg_args())
    }

    /// Copy streams without re-encoding.
    pub fn codec_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Stop at the end of the shortest mapped stream.
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    /// Clamp output duration.
    pub fn max_duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Extract single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-v".to_string());
        args.push("error".to_string());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());

        args
    }

    /// Human-readable command line for logs and error reports.
    pub fn to_command_line(&self) -> String {
        let mut line = String::from("ffmpeg");
        for arg in self.build_args() {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) || arg.contains(';') {
                line.push('\'');
                line.push_str(&arg.replace('\'', "'\\''"));
                line.push('\'');
            } else {
                line.push_str(&arg);
            }
        }
        line
    }
}

/// Runner for FFmpeg commands with progress tracking.
///
/// Each call blocks the caller until the process exits. There is no timeout.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner;

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self
    }

    /// Run an FFmpeg command with progress callback.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, progress_callback: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        check_ffmpeg()?;

        let args = cmd.build_args();
        let command_line = cmd.to_command_line();
        debug!("Running FFmpeg: {}", command_line);
        let started = Instant::now();

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr = child.stderr.take().ok_or_else(|| {
            MediaError::ffmpeg_failed("stderr not captured", command_line.clone(), None, None)
        })?;
        let diagnostics = drain_stderr(BufReader::new(stderr), progress_callback).await;

        let status = child.wait().await?;
        metrics::histogram!("reelcycle_ffmpeg_seconds").record(started.elapsed().as_secs_f64());

        if status.success() {
            Ok(())
        } else {
            metrics::counter!("reelcycle_ffmpeg_failures_total").increment(1);
            let stderr = Vec::from(diagnostics).join("\n");
            Err(MediaError::ffmpeg_failed(
                format!("FFmpeg exited with {}", status),
                command_line,
                Some(stderr),
                status.code(),
            ))
        }
    }
}

/// Consume FFmpeg's stderr until EOF or a read error.
///
/// Progress key=value lines go to `progress_callback`; the last
/// [`MAX_DIAGNOSTIC_LINES`] other lines are returned. Bytes that are not
/// valid UTF-8 (non-ASCII file names in a legacy encoding) are replaced.
async fn drain_stderr<R, F>(mut reader: R, progress_callback: F) -> VecDeque<String>
where
    R: AsyncBufRead + Unpin,
    F: Fn(FfmpegProgress),
{
    let mut current = FfmpegProgress::default();
    let mut diagnostics: VecDeque<String> = VecDeque::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Stopped reading FFmpeg stderr: {}", e);
                break;
            }
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        match parse_progress_line(line, &mut current) {
            LineKind::Snapshot(progress) => progress_callback(progress),
            LineKind::Field => {}
            LineKind::Other => {
                if diagnostics.len() == MAX_DIAGNOSTIC_LINES {
                    diagnostics.pop_front();
                }
                diagnostics.push_back(line.to_string());
            }
        }
    }
    diagnostics
}

enum LineKind {
    /// A complete progress block ended on this line
    Snapshot(FfmpegProgress),
    /// A progress field was updated
    Field,
    /// Not part of the progress protocol
    Other,
}

/// Parse a line from FFmpeg's -progress output.
fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> LineKind {
    let line = line.trim();

    let Some((key, value)) = line.split_once('=') else {
        return LineKind::Other;
    };

    match key {
        "out_time_ms" | "out_time_us" => {
            // Both keys carry microseconds in practice
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "out_time" => current.out_time = value.to_string(),
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "fps" => {
            if let Ok(fps) = value.parse() {
                current.fps = fps;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            if value == "end" {
                current.is_complete = true;
            }
            return LineKind::Snapshot(current.clone());
        }
        "bitrate" | "total_size" | "dup_frames" | "drop_frames" | "stream_0_0_q" | "out_time_ms_raw" => {}
        _ if key.contains(' ') || key.is_empty() => return LineKind::Other,
        _ => {}
    }

    LineKind::Field
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("out.mp4")
            .input(FfmpegInput::file("clip.mp4").seek(0.1).duration(4.2))
            .input(FfmpegInput::file("voice.mp3"))
            .map("v_out")
            .map("1:a")
            .encoding(&EncodingConfig::default());

        let args = cmd.build_args();
        let first_input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(&args[first_input - 4..first_input], ["-ss", "0.100", "-t", "4.200"]);
        assert_eq!(args[first_input + 1], "clip.mp4");
        assert!(args.windows(2).any(|w| w == ["-map", "[v_out]"]));
        assert!(args.windows(2).any(|w| w == ["-map", "1:a"]));
        assert_eq!(args.last().unwrap(), "out.mp4");
        assert_eq!(cmd.input_count(), 2);
    }

    #[test]
    fn test_lavfi_and_loop_inputs() {
        let cmd = FfmpegCommand::new("o.mp4")
            .input(FfmpegInput::looped_image("overlay.png"))
            .input(FfmpegInput::lavfi("anullsrc=channel_layout=stereo:sample_rate=48000"));
        let joined = cmd.build_args().join(" ");
        assert!(joined.contains("-loop 1 -i overlay.png"));
        assert!(joined.contains("-f lavfi -i anullsrc=channel_layout=stereo:sample_rate=48000"));
    }

    #[test]
    fn test_seek_from_end_is_negative() {
        let input = FfmpegInput::file("a.mp4").seek_from_end(0.1);
        assert_eq!(input.args, vec!["-sseof", "-0.100"]);
    }

    #[test]
    fn test_command_line_quotes_graphs() {
        let cmd = FfmpegCommand::new("o.mp4")
            .input(FfmpegInput::file("a.mp4"))
            .filter_complex("[0:v]null[v];[0:a]anull[a]");
        assert!(cmd.to_command_line().contains("'[0:v]null[v];[0:a]anull[a]'"));
    }

    #[test]
    fn test_progress_parsing() {
        let mut progress = FfmpegProgress::default();

        assert!(matches!(parse_progress_line("out_time_us=5000000", &mut progress), LineKind::Field));
        assert_eq!(progress.out_time_ms, 5000);

        parse_progress_line("speed=1.5x", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        parse_progress_line("speed=N/A", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        match parse_progress_line("progress=end", &mut progress) {
            LineKind::Snapshot(p) => assert!(p.is_complete),
            _ => panic!("expected snapshot"),
        }
    }

    #[test]
    fn test_non_progress_lines_are_diagnostics() {
        let mut progress = FfmpegProgress::default();
        assert!(matches!(
            parse_progress_line("clip.mp4: No such file or directory", &mut progress),
            LineKind::Other
        ));
        assert!(matches!(
            parse_progress_line("Error initializing filter 'scale' with args 'w=a'", &mut progress),
            LineKind::Other
        ));
    }

    #[tokio::test]
    async fn test_stderr_with_invalid_utf8_is_kept() {
        let stderr: &[u8] = b"frame=10\nprogress=continue\n\xff\xfe\xec\x97: Invalid data found\r\nConversion failed!";
        let snapshots = std::sync::Mutex::new(Vec::new());
        let diagnostics = drain_stderr(stderr, |p: FfmpegProgress| snapshots.lock().unwrap().push(p)).await;

        assert_eq!(snapshots.lock().unwrap().len(), 1);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics[0].starts_with('\u{FFFD}'));
        assert!(diagnostics[0].ends_with(": Invalid data found"));
        assert_eq!(diagnostics[1], "Conversion failed!");
    }

    #[tokio::test]
    async fn test_stderr_keeps_only_recent_lines() {
        let text: String = (0..MAX_DIAGNOSTIC_LINES + 5).map(|i| format!("line {}\n", i)).collect();
        let diagnostics = drain_stderr(text.as_bytes(), |_: FfmpegProgress| {}).await;
        assert_eq!(diagnostics.len(), MAX_DIAGNOSTIC_LINES);
        assert_eq!(diagnostics[0], "line 5");
    }
}
