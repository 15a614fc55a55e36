//! Opus encoder wrapping the mixed PCM stream. Grounded on the teacher's
//! `OpusEncoder` (frame chunking, leftover-sample carry, pts bookkeeping).

use std::collections::VecDeque;

use ffmpeg_next::{self as ffmpeg, Rational};

use crate::types::error::Result;
use crate::types::units::EncodedAudioUnit;

pub const SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: u32 = 2;
const BIT_RATE: usize = 128_000;
const HNS_PER_SECOND: i64 = crate::types::units::HNS_PER_SECOND;

pub struct AudioEncoder {
    encoder: ffmpeg::codec::encoder::Audio,
    next_pts_samples: i64,
    leftover: VecDeque<f32>,
    timestamps_hns: VecDeque<i64>,
}

impl AudioEncoder {
    pub fn new() -> Result<Self> {
        let codec = ffmpeg::codec::encoder::find(ffmpeg::codec::Id::OPUS)
            .ok_or(ffmpeg::Error::EncoderNotFound)?;

        let mut ctx = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .audio()?;
        ctx.set_rate(SAMPLE_RATE as i32);
        ctx.set_bit_rate(BIT_RATE);
        ctx.set_format(ffmpeg::format::Sample::F32(
            ffmpeg::format::sample::Type::Packed,
        ));
        ctx.set_time_base(Rational::new(1, SAMPLE_RATE as i32));
        ctx.set_channel_layout(ffmpeg::channel_layout::ChannelLayout::STEREO);

        let mut encoder = ctx.open()?;
        unsafe {
            (*encoder.as_mut_ptr()).frame_size =
                encoder.frame_size() as i32 * CHANNELS as i32;
        }

        Ok(Self {
            encoder,
            next_pts_samples: 0,
            leftover: VecDeque::with_capacity(4096),
            timestamps_hns: VecDeque::with_capacity(16),
        })
    }

    /// `samples` are interleaved stereo f32 PCM at 48kHz; `chunk_start_hns` is
    /// the timestamp of the first sample in this chunk.
    pub fn process(&mut self, samples: &[f32], chunk_start_hns: i64) -> Result<Vec<EncodedAudioUnit>> {
        let frame_size = self.encoder.frame_size() as usize;
        self.leftover.extend(samples.iter().copied());
        self.timestamps_hns.push_back(chunk_start_hns);

        let mut out = Vec::new();
        while self.leftover.len() >= frame_size {
            let frame_samples: Vec<f32> = self.leftover.drain(..frame_size).collect();
            let mut frame = ffmpeg::frame::Audio::new(
                self.encoder.format(),
                frame_size / CHANNELS as usize,
                self.encoder.channel_layout(),
            );
            frame.plane_mut(0).copy_from_slice(&frame_samples);
            frame.set_pts(Some(self.next_pts_samples));
            frame.set_rate(self.encoder.rate());

            self.encoder.send_frame(&frame)?;
            self.drain_packets(&mut out);
            self.next_pts_samples += (frame_size / CHANNELS as usize) as i64;
        }
        Ok(out)
    }

    pub fn flush(&mut self) -> Result<Vec<EncodedAudioUnit>> {
        self.encoder.send_eof()?;
        let mut out = Vec::new();
        self.drain_packets(&mut out);
        Ok(out)
    }

    fn drain_packets(&mut self, out: &mut Vec<EncodedAudioUnit>) {
        let mut packet = ffmpeg::codec::packet::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            if let Some(data) = packet.data() {
                let pts_samples = packet.pts().unwrap_or(0);
                let pts_hns = pts_samples * HNS_PER_SECOND / SAMPLE_RATE as i64;
                let duration_hns = self.encoder.frame_size() as i64 * HNS_PER_SECOND
                    / SAMPLE_RATE as i64
                    / CHANNELS as i64;
                out.push(EncodedAudioUnit {
                    data: data.to_vec(),
                    pts_hns,
                    duration_hns,
                });
            }
            packet = ffmpeg::codec::packet::Packet::empty();
        }
    }
}
