use std::path::{Path, PathBuf};

use ffmpeg_next::format::context::Input;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video as RawFrame;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Frame source backed by ffmpeg-next (libavformat + libavcodec).
///
/// The decoder and RGB24 converter are set up once in `open`. `frames`
/// resumes where the previous iteration stopped; indices count decoded
/// frames from zero.
#[derive(Default)]
pub struct FfmpegReader {
    source: Option<OpenSource>,
}

// Safety: the ffmpeg contexts are only touched by one thread at a time. The
// guarded release moves the reader to a worker thread, after which the pass
// no longer uses it.
unsafe impl Send for FfmpegReader {}

struct OpenSource {
    path: PathBuf,
    input: Input,
    stream_index: usize,
    decoder: ffmpeg_next::decoder::Video,
    to_rgb: scaling::Context,
    decoded: usize,
    skipped_packets: usize,
    eof_sent: bool,
}

impl FfmpegReader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        self.close();

        let input = ffmpeg_next::format::input(path)?;
        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| format!("{} has no video stream", path.display()))?;
        let stream_index = stream.index();
        let fps = frame_rate(&stream);
        let total_frames = usize::try_from(stream.frames()).unwrap_or(0);

        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?
            .decoder()
            .video()?;
        let to_rgb = scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            scaling::Flags::BILINEAR,
        )?;

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            total_frames,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
        };

        self.source = Some(OpenSource {
            path: path.to_path_buf(),
            input,
            stream_index,
            decoder,
            to_rgb,
            decoded: 0,
            skipped_packets: 0,
            eof_sent: false,
        });
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        match self.source.as_mut() {
            Some(source) => Box::new(std::iter::from_fn(move || source.next_frame().transpose())),
            None => Box::new(std::iter::once(Err("FfmpegReader: not opened".into()))),
        }
    }

    fn close(&mut self) {
        if let Some(source) = self.source.take() {
            log::debug!(
                "Released {}: {} frames decoded, {} packets skipped",
                source.path.display(),
                source.decoded,
                source.skipped_packets
            );
        }
    }
}

impl OpenSource {
    /// Decodes the next frame, or `None` once the decoder is drained.
    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        loop {
            let mut raw = RawFrame::empty();
            if self.decoder.receive_frame(&mut raw).is_ok() {
                return self.convert(&raw).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }

            match self.input.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        self.skipped_packets += 1;
                        log::debug!("Skipping undecodable packet: {e}");
                    }
                }
                None => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn convert(&mut self, raw: &RawFrame) -> Result<Frame, Box<dyn std::error::Error>> {
        let mut rgb = RawFrame::empty();
        self.to_rgb.run(raw, &mut rgb)?;
        let (width, height) = (rgb.width(), rgb.height());
        let frame = Frame::new(packed_rgb(&rgb), width, height, 3, self.decoded);
        self.decoded += 1;
        Ok(frame)
    }
}

/// Average frame rate of the stream, falling back to the container's
/// guess; 0.0 when neither is known.
fn frame_rate(stream: &ffmpeg_next::format::stream::Stream) -> f64 {
    [stream.avg_frame_rate(), stream.rate()]
        .into_iter()
        .find(|r| r.numerator() > 0 && r.denominator() > 0)
        .map_or(0.0, f64::from)
}

/// RGB24 pixels without the per-row padding ffmpeg adds for alignment.
fn packed_rgb(rgb: &RawFrame) -> Vec<u8> {
    let row_bytes = rgb.width() as usize * 3;
    rgb.data(0)
        .chunks(rgb.stride(0))
        .take(rgb.height() as usize)
        .flat_map(|row| &row[..row_bytes])
        .copied()
        .collect()
}
