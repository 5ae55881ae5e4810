//! Frame-level video access backed by the `ffmpeg` and `ffprobe` executables.
//!
//! A [`Video`] is either a reader (opened on an existing file) or a writer
//! (created "like" another video). Frames travel through the child process
//! pipes as packed `rgb24` rawvideo and are converted to and from the planar
//! [`Image`] layout here.

use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use image::{DynamicImage, GenericImageView, RgbImage};
use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::state::VideoConfig;

/// Checks if FFmpeg is installed and available in the system path
pub fn check_ffmpeg_installed() -> Result<()> {
    check_tools(&VideoConfig::default())
}

/// Checks that both configured executables run
pub fn check_tools(config: &VideoConfig) -> Result<()> {
    for tool in [&config.ffmpeg_path, &config.ffprobe_path] {
        let output = Command::new(tool)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|_| Error::Video(format!("{} is not installed or not in PATH", tool.display())))?;

        if !output.success() {
            return Err(Error::Video(format!("{} -version failed", tool.display())));
        }
    }
    Ok(())
}

/// A planar 8-bit image, indexed `[plane, row, column]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    data: Array3<u8>,
}

impl Image {
    /// Creates a black image. `nplanes` is 1 (gray) or 3 (RGB).
    pub fn new(width: usize, height: usize, nplanes: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidInput(format!(
                "image dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        if nplanes != 1 && nplanes != 3 {
            return Err(Error::InvalidInput(format!(
                "images have 1 or 3 planes, got {}",
                nplanes
            )));
        }
        Ok(Self {
            data: Array3::zeros((nplanes, height, width)),
        })
    }

    /// Width in pixels
    pub fn width(&self) -> usize {
        self.data.shape()[2]
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        self.data.shape()[1]
    }

    /// Number of planes
    pub fn nplanes(&self) -> usize {
        self.data.shape()[0]
    }

    /// Pixel planes
    pub fn data(&self) -> &Array3<u8> {
        &self.data
    }

    /// Mutable pixel planes
    pub fn data_mut(&mut self) -> &mut Array3<u8> {
        &mut self.data
    }

    /// Reallocates the pixel storage when the geometry changes. Contents are
    /// not preserved in that case.
    pub fn resize(&mut self, width: usize, height: usize, nplanes: usize) -> Result<()> {
        if self.width() != width || self.height() != height || self.nplanes() != nplanes {
            *self = Self::new(width, height, nplanes)?;
        }
        Ok(())
    }

    /// Converts from an `image` crate image, to gray when `nplanes` is 1.
    pub fn from_dynamic(img: &DynamicImage, nplanes: usize) -> Result<Self> {
        let (width, height) = img.dimensions();
        let mut out = Self::new(width as usize, height as usize, nplanes)?;
        out.fill_from_rgb(&img.to_rgb8())?;
        Ok(out)
    }

    /// Converts into an `image` crate image (`Luma8` or `Rgb8`).
    pub fn to_dynamic(&self) -> Result<DynamicImage> {
        let (w, h) = (self.width() as u32, self.height() as u32);
        let img = if self.nplanes() == 1 {
            let raw: Vec<u8> = self.data.index_axis(Axis(0), 0).iter().copied().collect();
            image::GrayImage::from_raw(w, h, raw).map(DynamicImage::ImageLuma8)
        } else {
            RgbImage::from_raw(w, h, self.to_rgb_bytes()).map(DynamicImage::ImageRgb8)
        };
        img.ok_or_else(|| Error::Internal("pixel buffer does not match image geometry".to_string()))
    }

    /// Reads a JPEG or PNG file, to gray when `nplanes` is 1.
    pub fn load<P: AsRef<Path>>(path: P, nplanes: usize) -> Result<Self> {
        let img = image::open(path.as_ref())?;
        Self::from_dynamic(&img, nplanes)
    }

    /// Writes the image; the format follows the file extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_dynamic()?.save(path.as_ref())?;
        Ok(())
    }

    /// Fills the planes from a packed RGB image of the same geometry.
    fn fill_from_rgb(&mut self, rgb: &RgbImage) -> Result<()> {
        let (w, h) = rgb.dimensions();
        if w as usize != self.width() || h as usize != self.height() {
            return Err(Error::ShapeMismatch {
                expected: vec![self.height(), self.width()],
                actual: vec![h as usize, w as usize],
            });
        }
        if self.nplanes() == 1 {
            let gray = DynamicImage::ImageRgb8(rgb.clone()).to_luma8();
            for (x, y, p) in gray.enumerate_pixels() {
                self.data[[0, y as usize, x as usize]] = p[0];
            }
        } else {
            for (x, y, p) in rgb.enumerate_pixels() {
                for c in 0..3 {
                    self.data[[c, y as usize, x as usize]] = p[c];
                }
            }
        }
        Ok(())
    }

    /// Packed `rgb24` bytes; gray images are replicated over the channels.
    fn to_rgb_bytes(&self) -> Vec<u8> {
        let (w, h, planes) = (self.width(), self.height(), self.nplanes());
        let mut out = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                for c in 0..3 {
                    let plane = if planes == 1 { 0 } else { c };
                    out.push(self.data[[plane, y, x]]);
                }
            }
        }
        out
    }
}

/// What a [`Video`] handle is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoState {
    /// Closed, no child process attached
    Idle,
    /// Decoding frames from an existing file
    Read,
    /// Encoding frames into a new file
    Write,
}

/// Stream properties reported by `ffprobe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Frame width in pixels
    pub width: usize,
    /// Frame height in pixels
    pub height: usize,
    /// Frames per second
    pub frame_rate: f64,
    /// Number of frames (estimated from the duration when the container does not say)
    pub frame_count: u64,
    /// Codec name
    pub codec: String,
}

#[derive(Deserialize)]
struct StreamList {
    #[serde(default)]
    streams: Vec<StreamEntry>,
}

#[derive(Deserialize)]
struct StreamEntry {
    width: Option<usize>,
    height: Option<usize>,
    codec_name: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

/// Parses an ffprobe rate such as `30000/1001` or `25`.
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num.trim().parse::<f64>().ok()? / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value > 0.0).then_some(value)
}

fn parse_stream_info(json: &str, default_frame_rate: f64) -> Result<VideoInfo> {
    let list: StreamList = serde_json::from_str(json)?;
    let stream = list
        .streams
        .into_iter()
        .find(|s| s.width.is_some() && s.height.is_some())
        .ok_or_else(|| Error::Video("no video stream found".to_string()))?;

    let width = stream.width.unwrap_or_default();
    let height = stream.height.unwrap_or_default();
    if width == 0 || height == 0 {
        return Err(Error::Video(format!("invalid frame size {}x{}", width, height)));
    }

    let frame_rate = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .unwrap_or(default_frame_rate);

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .or_else(|| {
            stream
                .duration
                .as_deref()
                .and_then(|d| d.parse::<f64>().ok())
                .map(|d| (d * frame_rate).round() as u64)
        })
        .unwrap_or(0);

    Ok(VideoInfo {
        width,
        height,
        frame_rate,
        frame_count,
        codec: stream.codec_name.unwrap_or_else(|| "unknown".to_string()),
    })
}

/// Runs `ffprobe` on the first video stream of `path`.
pub fn stream_info<P: AsRef<Path>>(path: P, config: &VideoConfig) -> Result<VideoInfo> {
    let path = path.as_ref();
    let output = Command::new(&config.ffprobe_path)
        .args(["-v", "error", "-print_format", "json", "-show_streams", "-select_streams", "v:0"])
        .arg(path)
        .output()
        .map_err(|e| Error::Video(format!("failed to spawn {}: {}", config.ffprobe_path.display(), e)))?;

    if !output.status.success() {
        return Err(Error::Video(format!(
            "ffprobe failed on {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let json = String::from_utf8(output.stdout)
        .map_err(|_| Error::Video(format!("{}: invalid ffprobe output", path.display())))?;
    parse_stream_info(&json, config.default_frame_rate)
}

/// A video file opened for frame-by-frame reading or writing.
#[derive(Debug)]
pub struct Video {
    path: PathBuf,
    info: VideoInfo,
    state: VideoState,
    child: Option<Child>,
    reader: Option<BufReader<ChildStdout>>,
    writer: Option<BufWriter<ChildStdin>>,
    frame_buf: Vec<u8>,
    frames: u64,
}

impl Video {
    /// Opens an existing video for reading with the default configuration.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &VideoConfig::default())
    }

    /// Opens an existing video for reading.
    pub fn open_with<P: AsRef<Path>>(path: P, config: &VideoConfig) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(format!("video file {}", path.display())));
        }

        let info = stream_info(path, config)?;
        log::debug!(
            "Opening {} for reading: {}x{} @ {:.3}fps, {} frames ({})",
            path.display(),
            info.width,
            info.height,
            info.frame_rate,
            info.frame_count,
            info.codec
        );

        let mut child = Command::new(&config.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Video(format!("failed to spawn {}: {}", config.ffmpeg_path.display(), e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Video("failed to capture ffmpeg stdout".to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            frame_buf: vec![0u8; info.width * info.height * 3],
            info,
            state: VideoState::Read,
            child: Some(child),
            reader: Some(BufReader::new(stdout)),
            writer: None,
            frames: 0,
        })
    }

    /// Creates a new video with the geometry and frame rate of `template`.
    pub fn create_like<P: AsRef<Path>>(path: P, template: &Video) -> Result<Self> {
        Self::create_with(path, template.info.clone(), &VideoConfig::default())
    }

    /// Creates a new video for writing with explicit stream properties.
    ///
    /// The container is chosen by ffmpeg from the file extension; the encoder
    /// is `config.codec` when set, ffmpeg's default for the container otherwise.
    pub fn create_with<P: AsRef<Path>>(path: P, info: VideoInfo, config: &VideoConfig) -> Result<Self> {
        let path = path.as_ref();
        if info.width == 0 || info.height == 0 {
            return Err(Error::InvalidInput(format!(
                "cannot create a {}x{} video",
                info.width, info.height
            )));
        }
        let frame_rate = if info.frame_rate > 0.0 {
            info.frame_rate
        } else {
            config.default_frame_rate
        };

        let mut cmd = Command::new(&config.ffmpeg_path);
        cmd.args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .arg("-s")
            .arg(format!("{}x{}", info.width, info.height))
            .arg("-r")
            .arg(format!("{}", frame_rate))
            .args(["-i", "-"]);
        if let Some(codec) = &config.codec {
            cmd.arg("-c:v").arg(codec);
        }
        cmd.arg(path);

        log::debug!(
            "Creating {} for writing: {}x{} @ {:.3}fps",
            path.display(),
            info.width,
            info.height,
            frame_rate
        );

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Video(format!("failed to spawn {}: {}", config.ffmpeg_path.display(), e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Video("failed to capture ffmpeg stdin".to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            info: VideoInfo {
                frame_rate,
                frame_count: 0,
                codec: config.codec.clone().unwrap_or_else(|| "default".to_string()),
                ..info
            },
            state: VideoState::Write,
            child: Some(child),
            reader: None,
            writer: Some(BufWriter::new(stdin)),
            frame_buf: Vec::new(),
            frames: 0,
        })
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frame width in pixels
    pub fn width(&self) -> usize {
        self.info.width
    }

    /// Frame height in pixels
    pub fn height(&self) -> usize {
        self.info.height
    }

    /// Frames per second
    pub fn frame_rate(&self) -> f64 {
        self.info.frame_rate
    }

    /// Number of frames in the file (readers) or written so far (writers)
    pub fn frame_count(&self) -> u64 {
        self.info.frame_count
    }

    /// Codec name
    pub fn codec_name(&self) -> &str {
        &self.info.codec
    }

    /// Stream properties
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// Current state
    pub fn state(&self) -> VideoState {
        self.state
    }

    /// Frames read or written through this handle
    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    /// Reads the next frame into `image`.
    ///
    /// The image is resized to the video geometry and keeps its plane count.
    /// Returns `Ok(false)` once the stream is exhausted.
    pub fn read(&mut self, image: &mut Image) -> Result<bool> {
        if self.state != VideoState::Read {
            return Err(Error::InvalidState(format!(
                "cannot read from a video in state {:?}",
                self.state
            )));
        }
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| Error::InvalidState("video reader is closed".to_string()))?;

        match reader.read_exact(&mut self.frame_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                log::debug!("End of stream on {} after {} frames", self.path.display(), self.frames);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        let rgb = RgbImage::from_raw(
            self.info.width as u32,
            self.info.height as u32,
            self.frame_buf.clone(),
        )
        .ok_or_else(|| Error::Internal("frame buffer does not match video geometry".to_string()))?;

        image.resize(self.info.width, self.info.height, image.nplanes())?;
        image.fill_from_rgb(&rgb)?;
        self.frames += 1;
        Ok(true)
    }

    /// Iterates over the remaining frames, decoding each into a new image.
    pub fn frames(&mut self, nplanes: usize) -> Frames<'_> {
        Frames { video: self, nplanes }
    }

    /// Appends `image` as the next frame; its geometry must match the video.
    pub fn write(&mut self, image: &Image) -> Result<bool> {
        if self.state != VideoState::Write {
            return Err(Error::InvalidState(format!(
                "cannot write to a video in state {:?}",
                self.state
            )));
        }
        if image.width() != self.info.width || image.height() != self.info.height {
            return Err(Error::ShapeMismatch {
                expected: vec![self.info.height, self.info.width],
                actual: vec![image.height(), image.width()],
            });
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::InvalidState("video writer is closed".to_string()))?;

        writer.write_all(&image.to_rgb_bytes()).map_err(|e| match e.kind() {
            ErrorKind::BrokenPipe => Error::Video(format!("ffmpeg stopped accepting frames for {}", self.path.display())),
            _ => Error::Io(e),
        })?;

        self.frames += 1;
        self.info.frame_count += 1;
        Ok(true)
    }

    /// Finishes the stream and reaps the ffmpeg process. Writers fail when
    /// ffmpeg could not produce the output file.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            self.state = VideoState::Idle;
            return Ok(());
        };

        let state = self.state;
        self.state = VideoState::Idle;
        self.reader = None;

        if let Some(mut writer) = self.writer.take() {
            let flushed = writer.flush();
            // dropping stdin signals end of input
            drop(writer);
            let status = child.wait()?;
            flushed?;
            if !status.success() {
                return Err(Error::Video(format!(
                    "ffmpeg failed to encode {} ({})",
                    self.path.display(),
                    status
                )));
            }
            log::debug!("Wrote {} frames to {}", self.frames, self.path.display());
        } else if state == VideoState::Read {
            // the decoder may still be producing frames nobody will read
            let _ = child.kill();
            child.wait()?;
        }
        Ok(())
    }
}

impl Drop for Video {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close {}: {}", self.path.display(), e);
        }
    }
}

/// Iterator returned by [`Video::frames`].
#[derive(Debug)]
pub struct Frames<'a> {
    video: &'a mut Video,
    nplanes: usize,
}

impl Iterator for Frames<'_> {
    type Item = Result<Image>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut image = match Image::new(self.video.width(), self.video.height(), self.nplanes) {
            Ok(image) => image,
            Err(e) => return Some(Err(e)),
        };
        match self.video.read(&mut image) {
            Ok(true) => Some(Ok(image)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
