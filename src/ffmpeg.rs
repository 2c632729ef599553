// src/ffmpeg.rs

use crate::error::{Result, VqError};
use crate::frame::{Frame, FrameSource};
use log::{debug, error, info, warn};
use std::ffi::OsString;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Best-effort; 0 when neither the stream header nor the duration says.
    pub frame_count: u64,
    pub fps: f64,
}

/// Runs ffprobe to get video metadata.
pub fn get_video_info(video_path: &Path) -> Result<VideoInfo> {
    info!("Probing video file: {}", video_path.display());
    if !video_path.exists() {
        return Err(VqError::PathNotFound(video_path.to_path_buf()));
    }

    let output = Command::new("ffprobe")
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=width,height,nb_frames,r_frame_rate,duration:format=duration",
            "-of", "json",
        ])
        .arg(video_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("ffprobe failed for {}: {}", video_path.display(), stderr.trim());
        return Err(VqError::Command(format!(
            "ffprobe failed for {}: {}",
            video_path.display(),
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    debug!("ffprobe output for {}: {}", video_path.display(), stdout);

    let info = parse_probe_output(video_path, &stdout)?;
    info!(
        "Detected Info for {}: {}x{} @ {:.3} fps, {} frames",
        video_path.display(),
        info.width,
        info.height,
        info.fps,
        info.frame_count
    );
    Ok(info)
}

/// Extracts `VideoInfo` from ffprobe's JSON output.
fn parse_probe_output(video_path: &Path, stdout: &str) -> Result<VideoInfo> {
    let json: serde_json::Value = serde_json::from_str(stdout)
        .map_err(|e| VqError::Parse(format!("Failed to parse ffprobe JSON: {}", e)))?;

    let stream = json["streams"]
        .get(0)
        .ok_or_else(|| VqError::Parse("No video stream found in ffprobe output".to_string()))?;

    let width = stream["width"]
        .as_u64()
        .ok_or_else(|| VqError::Parse("Missing width".to_string()))? as u32;
    let height = stream["height"]
        .as_u64()
        .ok_or_else(|| VqError::Parse("Missing height".to_string()))? as u32;
    if width == 0 || height == 0 {
        return Err(VqError::Parse(format!("Invalid frame size {}x{}", width, height)));
    }

    // fps only feeds the frame-count estimate below; an unusable rate is not fatal.
    let fps = match stream["r_frame_rate"].as_str().map(parse_frame_rate) {
        Some(Ok(fps)) => fps,
        Some(Err(e)) => {
            warn!("Ignoring frame rate of {}: {}", video_path.display(), e);
            0.0
        }
        None => {
            warn!("No frame rate reported for {}", video_path.display());
            0.0
        }
    };

    // nb_frames is absent for many containers; estimate from duration then.
    let frame_count = match stream["nb_frames"].as_str().and_then(|s| s.parse::<u64>().ok()) {
        Some(count) => count,
        None => {
            let duration = stream["duration"]
                .as_str()
                .or_else(|| json["format"]["duration"].as_str())
                .and_then(|s| s.parse::<f64>().ok());
            match duration {
                Some(d) if d > 0.0 && fps > 0.0 => {
                    let estimate = (d * fps).round() as u64;
                    warn!(
                        "Frame count not reported for {}, estimated {} from duration",
                        video_path.display(),
                        estimate
                    );
                    estimate
                }
                _ => {
                    warn!("Frame count unknown for {}", video_path.display());
                    0
                }
            }
        }
    };

    Ok(VideoInfo {
        path: video_path.to_path_buf(),
        width,
        height,
        frame_count,
        fps,
    })
}

/// Parses frame rate string (e.g., "24000/1001") into f64.
fn parse_frame_rate(fps_str: &str) -> Result<f64> {
    match fps_str.split_once('/') {
        Some((num, den)) => {
            let num = num
                .parse::<f64>()
                .map_err(|_| VqError::Parse(format!("Invalid FPS numerator: {}", num)))?;
            let den = den
                .parse::<f64>()
                .map_err(|_| VqError::Parse(format!("Invalid FPS denominator: {}", den)))?;
            if den == 0.0 {
                Err(VqError::Parse("FPS denominator cannot be zero".to_string()))
            } else {
                Ok(num / den)
            }
        }
        None => fps_str
            .parse::<f64>()
            .map_err(|_| VqError::Parse(format!("Invalid FPS format: {}", fps_str))),
    }
}

/// Arguments for an ffmpeg process writing packed rgb24 frames to stdout.
///
/// Rotation metadata is ignored so the output keeps the probed width and
/// height; otherwise a rotated stream would come out transposed.
fn decoder_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-loglevel", "error", "-noautorotate", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(path.as_os_str().to_owned());
    args.extend(
        ["-map", "0:v:0", "-an", "-sn", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"]
            .into_iter()
            .map(OsString::from),
    );
    args
}

/// Outcome of reading one raw frame from the decoder pipe.
#[derive(Debug, PartialEq)]
enum RawFrame {
    Full(Vec<u8>),
    /// The pipe closed part-way through a frame; holds the bytes received.
    Truncated(usize),
    End,
}

/// Reads exactly `frame_len` bytes, or reports how the stream ended.
fn read_raw_frame<R: Read>(reader: &mut R, frame_len: usize) -> std::io::Result<RawFrame> {
    let mut buf = vec![0u8; frame_len];
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(match filled {
        0 => RawFrame::End,
        n if n < frame_len => RawFrame::Truncated(n),
        _ => RawFrame::Full(buf),
    })
}

/// Frame source backed by an `ffmpeg` process decoding to raw RGB on stdout.
///
/// The decoder is killed and reaped when the source is dropped.
pub struct FfmpegSource {
    info: VideoInfo,
    child: Child,
    stdout: ChildStdout,
    stderr_thread: Option<JoinHandle<String>>,
    frame_len: usize,
    frames_read: u64,
    finished: bool,
}

impl FfmpegSource {
    /// Probes `path` and starts decoding it.
    pub fn open(path: &Path) -> Result<Self> {
        let info = get_video_info(path).map_err(|e| match e {
            VqError::PathNotFound(_) => e,
            other => VqError::Open {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        })?;

        let mut command = Command::new("ffmpeg");
        command
            .args(decoder_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!("Spawning decoder: {:?}", command);

        let mut child = command.spawn().map_err(|e| VqError::Open {
            path: path.to_path_buf(),
            reason: format!("failed to start ffmpeg: {}", e),
        })?;

        let stdout = child.stdout.take().ok_or_else(|| VqError::Open {
            path: path.to_path_buf(),
            reason: "failed to capture ffmpeg stdout".to_string(),
        })?;

        // Drain stderr so a chatty decoder cannot fill the pipe and stall.
        let stderr_thread = child.stderr.take().map(|stderr| {
            std::thread::spawn(move || {
                let mut buf = String::new();
                for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                    buf.push_str(&line);
                    buf.push('\n');
                }
                buf
            })
        });

        let frame_len = info.width as usize * info.height as usize * 3;
        info!("Opened {} for decoding", path.display());

        Ok(Self {
            info,
            child,
            stdout,
            stderr_thread,
            frame_len,
            frames_read: 0,
            finished: false,
        })
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn finish(&mut self) {
        self.finished = true;
        match self.child.wait() {
            Ok(status) if status.success() => {
                debug!(
                    "Decoder for {} finished after {} frames",
                    self.info.path.display(),
                    self.frames_read
                );
            }
            Ok(status) => {
                let stderr = self.take_stderr();
                warn!(
                    "Decoder for {} exited with {} after {} frames: {}",
                    self.info.path.display(),
                    status,
                    self.frames_read,
                    stderr.trim()
                );
            }
            Err(e) => warn!("Failed to wait for decoder of {}: {}", self.info.path.display(), e),
        }
    }

    fn take_stderr(&mut self) -> String {
        self.stderr_thread
            .take()
            .map(|t| t.join().unwrap_or_default())
            .unwrap_or_default()
    }
}

impl FrameSource for FfmpegSource {
    fn read_next(&mut self) -> Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }

        let buf = match read_raw_frame(&mut self.stdout, self.frame_len)? {
            RawFrame::Full(buf) => buf,
            RawFrame::Truncated(filled) => {
                warn!(
                    "Discarding truncated frame ({} of {} bytes) from {}",
                    filled,
                    self.frame_len,
                    self.info.path.display()
                );
                self.finish();
                return Ok(None);
            }
            RawFrame::End => {
                self.finish();
                return Ok(None);
            }
        };

        self.frames_read += 1;
        Frame::from_raw(self.info.width, self.info.height, buf)
            .map(Some)
            .ok_or_else(|| VqError::Parse("Decoded frame has unexpected size".to_string()))
    }

    fn frame_count(&self) -> u64 {
        self.info.frame_count
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.child.kill() {
                debug!("Decoder for {} already exited: {}", self.info.path.display(), e);
            }
            let _ = self.child.wait();
        }
        let _ = self.take_stderr();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Encodes a lossless solid-colour clip with ffmpeg's lavfi source.
    pub(crate) fn make_solid_clip(
        dir: &Path,
        name: &str,
        color: &str,
        size: &str,
        frames: u32,
    ) -> PathBuf {
        let path = dir.join(name);
        let status = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "lavfi", "-i"])
            .arg(format!("color=c={}:s={}:r=30", color, size))
            .args(["-frames:v", &frames.to_string(), "-c:v", "ffv1", "-pix_fmt", "yuv444p"])
            .arg(&path)
            .status()
            .unwrap();
        assert!(status.success(), "ffmpeg failed to create {}", path.display());
        path
    }

    #[test]
    fn frame_rate_fractions() {
        assert_eq!(parse_frame_rate("30/1").unwrap(), 30.0);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.001);
        assert_eq!(parse_frame_rate("25").unwrap(), 25.0);
        assert!(parse_frame_rate("30/0").is_err());
        assert!(parse_frame_rate("abc").is_err());
    }

    #[test]
    fn video_info_prefers_nb_frames() {
        let json = r#"{"streams":[{"width":1920,"height":1080,"r_frame_rate":"30/1","nb_frames":"250","duration":"9.0"}],"format":{"duration":"9.0"}}"#;
        let info = parse_probe_output(Path::new("a.mp4"), json).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(info.frame_count, 250);
        assert_eq!(info.fps, 30.0);
    }

    #[test]
    fn video_info_estimates_count_from_duration() {
        let json = r#"{"streams":[{"width":3840,"height":2160,"r_frame_rate":"25/1"}],"format":{"duration":"4.000000"}}"#;
        let info = parse_probe_output(Path::new("a.mkv"), json).unwrap();
        assert_eq!(info.frame_count, 100);
    }

    #[test]
    fn video_info_without_count_or_duration_reports_zero() {
        let json = r#"{"streams":[{"width":640,"height":360,"r_frame_rate":"30/1"}],"format":{}}"#;
        let info = parse_probe_output(Path::new("a.ts"), json).unwrap();
        assert_eq!(info.frame_count, 0);
    }

    #[test]
    fn unknown_frame_rate_is_not_fatal() {
        let json = r#"{"streams":[{"width":640,"height":360,"r_frame_rate":"0/0","nb_frames":"42"}],"format":{"duration":"1.4"}}"#;
        let info = parse_probe_output(Path::new("a.ts"), json).unwrap();
        assert_eq!(info.fps, 0.0);
        assert_eq!(info.frame_count, 42);

        // Without nb_frames there is nothing to estimate from.
        let json = r#"{"streams":[{"width":640,"height":360,"r_frame_rate":"0/0"}],"format":{"duration":"1.4"}}"#;
        let info = parse_probe_output(Path::new("a.ts"), json).unwrap();
        assert_eq!(info.frame_count, 0);

        let json = r#"{"streams":[{"width":640,"height":360}],"format":{}}"#;
        assert_eq!(parse_probe_output(Path::new("a.ts"), json).unwrap().fps, 0.0);
    }

    #[test]
    fn video_info_rejects_missing_stream() {
        let json = r#"{"streams":[],"format":{}}"#;
        assert!(matches!(
            parse_probe_output(Path::new("a.mp4"), json),
            Err(VqError::Parse(_))
        ));
    }

    #[test]
    fn decoder_keeps_coded_orientation() {
        let args = decoder_args(Path::new("portrait.mp4"));
        let position = |flag: &str| args.iter().position(|a| a == flag);
        let noautorotate = position("-noautorotate").expect("-noautorotate missing");
        let input = position("-i").unwrap();
        assert!(noautorotate < input, "-noautorotate must precede -i");
        assert_eq!(args[input + 1], OsString::from("portrait.mp4"));
        assert_eq!(position("-pix_fmt").map(|i| &args[i + 1]), Some(&OsString::from("rgb24")));
        assert_eq!(args.last(), Some(&OsString::from("-")));
    }

    #[test]
    fn raw_frames_are_read_whole() {
        let mut reader = Cursor::new(vec![7u8; 12]);
        assert_eq!(read_raw_frame(&mut reader, 6).unwrap(), RawFrame::Full(vec![7; 6]));
        assert_eq!(read_raw_frame(&mut reader, 6).unwrap(), RawFrame::Full(vec![7; 6]));
        assert_eq!(read_raw_frame(&mut reader, 6).unwrap(), RawFrame::End);
    }

    #[test]
    fn raw_frame_split_across_reads_is_reassembled() {
        let mut reader = Cursor::new(vec![1u8, 2, 3]).chain(Cursor::new(vec![4u8, 5, 6]));
        assert_eq!(
            read_raw_frame(&mut reader, 6).unwrap(),
            RawFrame::Full(vec![1, 2, 3, 4, 5, 6])
        );
    }

    #[test]
    fn short_final_raw_frame_is_truncated() {
        let mut reader = Cursor::new(vec![0u8; 10]);
        assert!(matches!(read_raw_frame(&mut reader, 6).unwrap(), RawFrame::Full(_)));
        assert_eq!(read_raw_frame(&mut reader, 6).unwrap(), RawFrame::Truncated(4));
    }

    #[test]
    fn empty_pipe_is_end_of_stream() {
        let mut reader = Cursor::new(Vec::<u8>::new());
        assert_eq!(read_raw_frame(&mut reader, 6).unwrap(), RawFrame::End);
    }

    #[test]
    fn open_missing_path_is_path_not_found() {
        let err = FfmpegSource::open(Path::new("/definitely/not/here.mp4")).err().unwrap();
        assert!(matches!(err, VqError::PathNotFound(_)));
    }

    #[test]
    #[ignore = "requires ffmpeg"]
    fn open_non_video_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_a_video.mp4");
        std::fs::write(&path, b"this is not a video").unwrap();
        let err = FfmpegSource::open(&path).err().unwrap();
        assert!(matches!(err, VqError::Open { .. }));
    }

    #[test]
    #[ignore = "requires ffmpeg"]
    fn decodes_every_frame_then_signals_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_solid_clip(dir.path(), "white.mkv", "white", "64x36", 12);
        let mut source = FfmpegSource::open(&path).unwrap();
        assert_eq!((source.info().width, source.info().height), (64, 36));

        let mut frames = 0;
        while let Some(frame) = source.read_next().unwrap() {
            assert_eq!(frame.dimensions(), (64, 36));
            frames += 1;
        }
        assert_eq!(frames, 12);
        assert!(source.read_next().unwrap().is_none());
    }
}
