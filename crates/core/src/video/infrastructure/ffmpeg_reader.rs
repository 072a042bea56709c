use std::path::Path;

use ffmpeg_next::format::context::Input;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video as RawFrame;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

type FrameResult = Result<Frame, Box<dyn std::error::Error>>;

/// Decodes the best video stream of a container with ffmpeg-next.
///
/// Frames come out as packed RGB24, indexed by decode order.
pub struct FfmpegReader {
    input: Option<Input>,
    stream_index: usize,
}

// Safety: FfmpegReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self {
            input: None,
            stream_index: 0,
        }
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

fn open_decoder(
    stream: &ffmpeg_next::Stream,
) -> Result<ffmpeg_next::decoder::Video, ffmpeg_next::Error> {
    ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?
        .decoder()
        .video()
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        let input = ffmpeg_next::format::input(path)?;

        let (stream_index, metadata) = {
            let stream = input
                .streams()
                .best(ffmpeg_next::media::Type::Video)
                .ok_or("No video stream found")?;
            let decoder = open_decoder(&stream)?;
            let rate = stream.rate();
            let fps = match rate.denominator() {
                0 => 0.0,
                d => rate.numerator() as f64 / d as f64,
            };
            let metadata = VideoMetadata {
                width: decoder.width(),
                height: decoder.height(),
                fps,
                total_frames: stream.frames().max(0) as usize,
            };
            (stream.index(), metadata)
        };

        log::debug!(
            "Opened {} ({}x{}, {} frames)",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.total_frames
        );
        self.stream_index = stream_index;
        self.input = Some(input);
        Ok(metadata)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = FrameResult> + '_> {
        let stream_index = self.stream_index;
        let Some(input) = self.input.as_mut() else {
            return Box::new(std::iter::once(Err("FfmpegReader: not opened".into())));
        };
        match DecodedFrames::new(input, stream_index) {
            Ok(frames) => Box::new(frames),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn close(&mut self) {
        self.input = None;
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Packets are still being fed to the decoder.
    Reading,
    /// EOF was sent; only buffered frames remain.
    Draining,
    Finished,
}

/// Pulls one decoded frame at a time, so the whole video never sits in memory.
struct DecodedFrames<'a> {
    input: &'a mut Input,
    stream_index: usize,
    decoder: ffmpeg_next::decoder::Video,
    to_rgb: scaling::Context,
    next_index: usize,
    phase: Phase,
}

impl<'a> DecodedFrames<'a> {
    fn new(input: &'a mut Input, stream_index: usize) -> Result<Self, Box<dyn std::error::Error>> {
        let decoder = {
            let stream = input
                .stream(stream_index)
                .ok_or("Video stream disappeared")?;
            open_decoder(&stream)?
        };
        let to_rgb = scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            input,
            stream_index,
            decoder,
            to_rgb,
            next_index: 0,
            phase: Phase::Reading,
        })
    }

    /// A frame the decoder already has buffered, converted to RGB.
    fn receive(&mut self) -> Option<FrameResult> {
        let mut decoded = RawFrame::empty();
        self.decoder.receive_frame(&mut decoded).ok()?;

        let mut rgb = RawFrame::empty();
        if let Err(e) = self.to_rgb.run(&decoded, &mut rgb) {
            return Some(Err(Box::new(e)));
        }
        let (width, height) = (rgb.width(), rgb.height());
        let frame = Frame::new(packed_rgb(&rgb), width, height, 3, self.next_index);
        self.next_index += 1;
        Some(Ok(frame))
    }

    /// Sends the next packet of the video stream to the decoder. Returns
    /// `false` once the container has no packets left.
    fn feed(&mut self) -> bool {
        for (stream, packet) in self.input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            match self.decoder.send_packet(&packet) {
                Ok(()) => return true,
                Err(e) => log::debug!("Skipping undecodable packet: {e}"),
            }
        }
        false
    }
}

impl Iterator for DecodedFrames<'_> {
    type Item = FrameResult;

    fn next(&mut self) -> Option<Self::Item> {
        while self.phase != Phase::Finished {
            if let Some(frame) = self.receive() {
                return Some(frame);
            }
            let phase = self.phase;
            self.phase = match phase {
                Phase::Reading if self.feed() => Phase::Reading,
                Phase::Reading => {
                    if let Err(e) = self.decoder.send_eof() {
                        log::debug!("Decoder rejected EOF: {e}");
                    }
                    Phase::Draining
                }
                Phase::Draining | Phase::Finished => Phase::Finished,
            };
        }
        None
    }
}

/// Plane 0 of an RGB24 frame without the per-row stride padding.
fn packed_rgb(rgb: &RawFrame) -> Vec<u8> {
    let row_len = rgb.width() as usize * 3;
    rgb.data(0)
        .chunks(rgb.stride(0))
        .take(rgb.height() as usize)
        .flat_map(|row| &row[..row_len])
        .copied()
        .collect()
}
